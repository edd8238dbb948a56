// Turath CLI - field tool for the offline heritage inventory

pub mod fields;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turath_record::{ArtifactDraft, ArtifactRecord, ClosedEnum, HeritageCategory, MediaKind, MediaRef};
use turath_store::{
    create_router, AppState, Catalog, Clock, HttpRemote, ListQuery, SortOrder, SyncCoordinator,
    TurathConfig, WriteOptions,
};

/// Turath - offline heritage artifact inventory
#[derive(Parser)]
#[command(name = "turath")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory (defaults to ~/.turath)
    #[arg(long, global = true, env = "TURATH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and configuration
    Init {
        /// Remote authority to synchronize with
        #[arg(long, value_name = "URL")]
        remote: Option<String>,
    },
    /// Record a new artifact
    Add {
        /// Draft JSON file to start from
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Set draft fields (can be specified multiple times)
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Save even if the inventory number is already in use
        #[arg(long)]
        force: bool,
    },
    /// Change fields of an existing artifact
    Edit {
        id: String,

        #[arg(short, long = "set", value_name = "KEY=VALUE", required = true)]
        set: Vec<String>,

        #[arg(long)]
        force: bool,
    },
    /// Print one artifact as JSON
    Show { id: String },
    /// List artifacts
    List {
        /// MATERIAL or IMMATERIAL
        #[arg(short, long)]
        category: Option<String>,

        /// Match name or inventory number
        #[arg(short, long)]
        search: Option<String>,

        /// insertion or recent
        #[arg(long, default_value = "insertion")]
        sort: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Delete an artifact
    Delete { id: String },
    /// Show dashboard counters
    Stats,
    /// Write every artifact to a JSON file
    Export {
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage stored media
    Media {
        #[command(subcommand)]
        action: MediaAction,
    },
    /// Release media nothing references any more
    Gc {
        /// Report what would be released without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Synchronize with the remote authority
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Serve the local HTTP API for the field UI
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787")]
        addr: String,
    },
}

#[derive(Subcommand)]
enum MediaAction {
    /// Store a file and print its reference
    Put {
        path: PathBuf,

        /// image, video or model
        #[arg(short, long, default_value = "image")]
        kind: String,
    },
    /// Write a stored payload to a file
    Get {
        reference: String,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Show connectivity and pending changes
    Status,
    /// Push pending changes now
    Push,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turath=info,turath_store=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "✗".red().bold(), "Error:".red());
        eprintln!("  {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    if let Commands::Init { remote } = &cli.command {
        return handle_init(&data_dir, remote.clone());
    }

    let config = TurathConfig::load_or_init(&data_dir)?;
    let catalog = Catalog::open(&data_dir, &config).await?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Add { file, set, force } => handle_add(&catalog, file.as_deref(), &set, force).await,
        Commands::Edit { id, set, force } => handle_edit(&catalog, &id, &set, force).await,
        Commands::Show { id } => {
            let record = catalog.store().get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::List {
            category,
            search,
            sort,
            limit,
        } => handle_list(&catalog, category, search, &sort, limit).await,
        Commands::Delete { id } => {
            catalog.store().delete(&id).await?;
            println!("{} Deleted {}", "✓".green().bold(), id);
            Ok(())
        }
        Commands::Stats => handle_stats(&catalog).await,
        Commands::Export { output } => handle_export(&catalog, output.as_deref()).await,
        Commands::Media { action } => handle_media(&catalog, action).await,
        Commands::Gc { dry_run } => handle_gc(&catalog, dry_run).await,
        Commands::Sync { action } => handle_sync(&catalog, &config, action).await,
        Commands::Serve { addr } => handle_serve(catalog, &config, &addr).await,
    }
}

fn handle_init(data_dir: &Path, remote: Option<String>) -> anyhow::Result<()> {
    let mut config = TurathConfig::load_or_init(data_dir)?;
    if let Some(url) = remote {
        config.sync.enabled = true;
        config.sync.remote_url = Some(url);
        config.save(data_dir)?;
    }

    println!("{} Data directory ready", "✓".green().bold());
    println!();
    println!("  Location: {}", data_dir.display());
    println!("  Database: {}", config.database_path(data_dir).display());
    println!("  Media:    {}", config.media_path(data_dir).display());
    match config.sync.remote_url.as_deref().filter(|_| config.sync.is_active()) {
        Some(url) => println!("  Sync:     {}", url.cyan()),
        None => println!("  Sync:     {}", "disabled".dimmed()),
    }
    Ok(())
}

async fn handle_add(
    catalog: &Catalog,
    file: Option<&Path>,
    set: &[String],
    force: bool,
) -> anyhow::Result<()> {
    // Start where a new field form starts, then layer the file and --set on top
    let mut draft = serde_json::to_value(ArtifactDraft::form_defaults(catalog.clock().now_millis()))?;
    if let Some(path) = file {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", path.display(), e))?;
        let from_file: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Failed to parse draft '{}': {}", path.display(), e))?;
        fields::merge(&mut draft, from_file);
    }
    fields::merge(&mut draft, fields::parse_fields(set)?);

    let draft: ArtifactDraft = serde_json::from_value(draft)?;
    let record = catalog.create_from_draft(draft, write_options(force)).await?;

    println!("{} Artifact recorded", "✓".green().bold());
    println!();
    print_summary(&record);
    Ok(())
}

async fn handle_edit(catalog: &Catalog, id: &str, set: &[String], force: bool) -> anyhow::Result<()> {
    let existing = catalog.store().get(id).await?;
    let mut draft = serde_json::to_value(&existing)?;
    fields::merge(&mut draft, fields::parse_fields(set)?);

    let draft: ArtifactDraft = serde_json::from_value(draft)?;
    let record = catalog.update_from_draft(id, draft, write_options(force)).await?;

    println!("{} Artifact updated", "✓".green().bold());
    println!();
    print_summary(&record);
    Ok(())
}

async fn handle_list(
    catalog: &Catalog,
    category: Option<String>,
    search: Option<String>,
    sort: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let category = category.as_deref().map(HeritageCategory::parse).transpose()?;
    let sort = match sort {
        "insertion" => SortOrder::Insertion,
        "recent" => SortOrder::Recent,
        other => anyhow::bail!("Unknown sort order '{}'. Use 'insertion' or 'recent'", other),
    };

    let mut cursor = catalog
        .store()
        .list(ListQuery {
            category,
            search,
            sort,
            page_size: None,
        })
        .await?;
    let total = cursor.total();
    let limit = limit.unwrap_or(usize::MAX);

    let mut shown = 0;
    'pages: loop {
        let page = cursor.next_page().await?;
        if page.is_empty() {
            break;
        }
        for record in page {
            if shown == limit {
                break 'pages;
            }
            println!(
                "{:<14} {:<28} {:<12} {}",
                record.inventory_number.bold(),
                truncate(&record.name, 28),
                record.category.code(),
                record.id.dimmed()
            );
            shown += 1;
        }
    }
    cursor.close().await?;

    println!();
    println!("  {} of {} artifacts", shown, total);
    Ok(())
}

async fn handle_stats(catalog: &Catalog) -> anyhow::Result<()> {
    let stats = catalog.stats().await?;
    println!("  Artifacts:  {}", stats.store.total);
    println!("    {}: {}", HeritageCategory::Material.label(), stats.store.material);
    println!("    {}: {}", HeritageCategory::Immaterial.label(), stats.store.immaterial);
    println!("  Locations:  {}", stats.store.locations);
    println!("  Pending:    {}", stats.store.pending_changes);
    println!("  Tombstones: {}", stats.store.tombstones);
    println!("  Media:      {}", format_bytes(stats.media_bytes));
    Ok(())
}

async fn handle_export(catalog: &Catalog, output: Option<&Path>) -> anyhow::Result<()> {
    let records = catalog.store().export_all().await?;
    let json = serde_json::to_string_pretty(&records)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .map_err(|e| anyhow::anyhow!("Failed to write '{}': {}", path.display(), e))?;
            println!("{} Exported {} artifacts", "✓".green().bold(), records.len());
            println!();
            println!("  Output: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn handle_media(catalog: &Catalog, action: MediaAction) -> anyhow::Result<()> {
    match action {
        MediaAction::Put { path, kind } => {
            let kind: MediaKind = kind.parse()?;
            let bytes = std::fs::read(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", path.display(), e))?;
            let size = bytes.len() as u64;
            let reference = catalog.put_media(bytes, kind, None).await?;

            println!("{} Media stored", "✓".green().bold());
            println!();
            println!("  Reference: {}", reference);
            println!("  Size:      {}", format_bytes(size));
            Ok(())
        }
        MediaAction::Get { reference, output } => {
            let reference: MediaRef = reference.parse()?;
            let (meta, bytes) = catalog.get_media(&reference).await?;
            std::fs::write(&output, &bytes)
                .map_err(|e| anyhow::anyhow!("Failed to write '{}': {}", output.display(), e))?;

            println!("{} Wrote {} ({})", "✓".green().bold(), output.display(), meta.content_type);
            Ok(())
        }
    }
}

async fn handle_gc(catalog: &Catalog, dry_run: bool) -> anyhow::Result<()> {
    let report = catalog.collect_garbage(dry_run).await?;
    let verb = if dry_run { "Would release" } else { "Released" };

    println!(
        "{} {} {} blobs ({})",
        "✓".green().bold(),
        verb,
        report.released.len(),
        format_bytes(report.released_bytes)
    );
    if report.retained > 0 {
        println!(
            "  {} orphans kept inside the {}h grace period",
            report.retained,
            catalog.grace_period().as_secs() / 3600
        );
    }
    for reference in &report.released {
        println!("    - {}", reference.to_string().dimmed());
    }
    Ok(())
}

async fn handle_sync(catalog: &Catalog, config: &TurathConfig, action: SyncAction) -> anyhow::Result<()> {
    let Some(coordinator) = build_coordinator(catalog, config) else {
        let pending = catalog.store().pending_count().await?;
        println!("  Sync:    {}", "disabled".dimmed());
        println!("  Pending: {}", pending);
        if matches!(action, SyncAction::Push) {
            anyhow::bail!("Sync is not configured. Run 'turath init --remote <URL>' first");
        }
        return Ok(());
    };

    match action {
        SyncAction::Status => {
            let status = coordinator.status().await?;
            println!("  Remote:    {}", config.sync.remote_url.as_deref().unwrap_or_default());
            println!("  Pending:   {}", status.pending);
            println!("  Conflicts: {}", status.conflicts);
            Ok(())
        }
        SyncAction::Push => {
            let report = coordinator.push_pending().await?;
            if report.went_offline {
                println!("{} {}", "✗".yellow().bold(), "Remote unreachable, changes kept".yellow());
            } else {
                println!("{} Push finished", "✓".green().bold());
            }
            println!();
            println!("  Applied:    {}", report.applied);
            println!("  Superseded: {}", report.superseded);
            println!("  Deferred:   {}", report.deferred);
            for failure in &report.failed {
                println!(
                    "  {} {} (seq {}): {}",
                    "✗".red(),
                    failure.record_id,
                    failure.seq,
                    failure.error
                );
            }
            Ok(())
        }
    }
}

async fn handle_serve(catalog: Catalog, config: &TurathConfig, addr: &str) -> anyhow::Result<()> {
    let coordinator = build_coordinator(&catalog, config).map(Arc::new);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sync_task = coordinator
        .clone()
        .map(|sync| tokio::spawn(sync.run(shutdown_rx)));

    let app = create_router(AppState::new(catalog, coordinator));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    tracing::info!("Listening on {}", addr);
    println!("{} Serving on http://{}", "✓".green().bold(), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    shutdown_tx.send(true).ok();
    if let Some(task) = sync_task {
        task.await.ok();
    }
    Ok(())
}

fn build_coordinator(catalog: &Catalog, config: &TurathConfig) -> Option<SyncCoordinator> {
    if !config.sync.is_active() {
        return None;
    }
    let url = config.sync.remote_url.as_deref()?;
    let remote = HttpRemote::new(url, config.sync.push_timeout());
    Some(SyncCoordinator::new(
        catalog.store().clone(),
        catalog.media(),
        Arc::new(remote),
        catalog.clock(),
        config.sync.clone(),
    ))
}

fn write_options(force: bool) -> WriteOptions {
    if force {
        WriteOptions::force()
    } else {
        WriteOptions::default()
    }
}

fn print_summary(record: &ArtifactRecord) {
    println!("  Id:        {}", record.id);
    println!("  Inventory: {}", record.inventory_number);
    println!("  Name:      {}", record.name);
    println!("  Category:  {}", record.category.label());
    println!("  Media:     {}", record.media_refs().count());
}

/// Truncates to `max` characters, counting chars rather than bytes.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Get the default data directory path (~/.turath)
fn default_data_dir() -> anyhow::Result<PathBuf> {
    #[cfg(unix)]
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;

    #[cfg(windows)]
    let home = std::env::var("USERPROFILE")
        .map_err(|_| anyhow::anyhow!("USERPROFILE environment variable not set"))?;

    Ok(PathBuf::from(home).join(".turath"))
}
