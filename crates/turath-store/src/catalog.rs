//! Catalog: the operations the field UI performs, composed from the record
//! codec, the local store and the media store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use turath_record::{
    prepare, ArtifactDraft, ArtifactRecord, InlineMedia, MediaKind, MediaRef, ValidationError,
};

use crate::analysis::AnalysisTracker;
use crate::clock::{Clock, SystemClock};
use crate::config::{MediaGcConfig, TurathConfig};
use crate::error::{StoreError, StoreResult};
use crate::media::{FilesystemMediaStore, MediaMetadata, MediaStore};
use crate::store::{DeleteMode, LocalStore, StoreStats, WriteOptions};

/// Dashboard counters plus media usage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    #[serde(flatten)]
    pub store: StoreStats,
    pub media_bytes: u64,
}

/// Outcome of a media maintenance pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcReport {
    /// Orphans old enough to release.
    pub released: Vec<MediaRef>,
    pub released_bytes: u64,
    /// Orphans still inside the grace period.
    pub retained: usize,
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct Catalog {
    store: LocalStore,
    media: Arc<dyn MediaStore>,
    clock: Arc<dyn Clock>,
    gc: MediaGcConfig,
    analysis: AnalysisTracker,
}

impl Catalog {
    pub fn new(store: LocalStore, media: Arc<dyn MediaStore>, clock: Arc<dyn Clock>, gc: MediaGcConfig) -> Self {
        Self {
            store: store.with_clock(Arc::clone(&clock)),
            media,
            clock,
            gc,
            analysis: AnalysisTracker::new(),
        }
    }

    /// Opens the database and media directory described by `config`.
    pub async fn open(data_dir: &Path, config: &TurathConfig) -> StoreResult<Self> {
        let delete_mode = if config.sync.is_active() {
            DeleteMode::Tombstone
        } else {
            DeleteMode::Physical
        };
        let store = LocalStore::open(
            &config.database_path(data_dir),
            config.max_connections,
            delete_mode,
        )
        .await?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let media = FilesystemMediaStore::new(config.media_path(data_dir)).with_clock(Arc::clone(&clock));
        Ok(Self::new(store, Arc::new(media), clock, config.media_gc.clone()))
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn media(&self) -> Arc<dyn MediaStore> {
        Arc::clone(&self.media)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn analysis(&self) -> &AnalysisTracker {
        &self.analysis
    }

    /// Saves a new record from a draft, generating an id when absent.
    pub async fn create_from_draft(
        &self,
        mut draft: ArtifactDraft,
        options: WriteOptions,
    ) -> StoreResult<ArtifactRecord> {
        draft.ensure_id();
        let draft = self.ingest_inline_media(draft).await?;
        let record = prepare(draft, self.clock.now_millis())?;
        self.store.create_with(record, options).await
    }

    /// Replaces the record `id` with the draft's content.
    pub async fn update_from_draft(
        &self,
        id: &str,
        mut draft: ArtifactDraft,
        options: WriteOptions,
    ) -> StoreResult<ArtifactRecord> {
        let existing = self.store.get(id).await?;
        draft.id = Some(existing.id.clone());
        draft.created_at = Some(existing.created_at);
        let draft = self.ingest_inline_media(draft).await?;
        let record = prepare(draft, self.clock.now_millis())?;
        self.store.update_with(record, options).await
    }

    /// Moves `data:` URLs held by a draft into the media store.
    pub async fn ingest_inline_media(&self, mut draft: ArtifactDraft) -> StoreResult<ArtifactDraft> {
        if let Some(images) = draft.images.take() {
            let mut refs = Vec::with_capacity(images.len());
            for image in images {
                refs.push(self.ingest_one("images", image, MediaKind::Image).await?);
            }
            draft.images = Some(refs);
        }
        if let Some(video) = draft.video.take() {
            draft.video = Some(self.ingest_one("video", video, MediaKind::Video).await?);
        }
        if let Some(model) = draft.model3d.take() {
            draft.model3d = Some(self.ingest_one("model3d", model, MediaKind::Model).await?);
        }
        Ok(draft)
    }

    async fn ingest_one(&self, field: &'static str, raw: String, fallback: MediaKind) -> StoreResult<String> {
        if !InlineMedia::is_data_url(raw.trim()) {
            return Ok(raw);
        }
        let inline = InlineMedia::from_data_url(raw.trim()).map_err(|err| match err {
            ValidationError::Malformed { reason, .. } => ValidationError::malformed(field, reason),
            other => other,
        })?;
        let kind = inline.kind().unwrap_or(fallback);
        let reference = self.put_media(inline.bytes, kind, Some(inline.mime)).await?;
        Ok(reference.to_string())
    }

    /// Stores a payload off the async workers.
    pub async fn put_media(
        &self,
        bytes: Vec<u8>,
        kind: MediaKind,
        content_type: Option<String>,
    ) -> StoreResult<MediaRef> {
        let media = Arc::clone(&self.media);
        let content_type = content_type.unwrap_or_else(|| kind.default_mime().to_string());
        run_blocking(move || media.put_typed(&bytes, kind, &content_type)).await
    }

    pub async fn get_media(&self, reference: &MediaRef) -> StoreResult<(MediaMetadata, Vec<u8>)> {
        let media = Arc::clone(&self.media);
        let reference = reference.clone();
        run_blocking(move || {
            let meta = media.head(&reference)?;
            let bytes = media.get(&reference)?;
            Ok((meta, bytes))
        })
        .await
    }

    pub async fn stats(&self) -> StoreResult<CatalogStats> {
        let store = self.store.stats().await?;
        let media = Arc::clone(&self.media);
        let media_bytes = run_blocking(move || media.stored_bytes()).await?;
        Ok(CatalogStats { store, media_bytes })
    }

    /// Releases media no record or pending change references.
    ///
    /// Orphans younger than the grace period are kept: they may belong to a
    /// draft whose save has not happened yet.
    pub async fn collect_garbage(&self, dry_run: bool) -> StoreResult<GcReport> {
        let live = self.store.live_media_refs().await?;
        let media = Arc::clone(&self.media);
        let orphans = run_blocking(move || media.list_orphans(&live)).await?;

        let grace = chrono::Duration::from_std(self.gc.grace_period())
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let cutoff = chrono::DateTime::from_timestamp_millis(self.clock.now_millis())
            .unwrap_or_else(chrono::Utc::now)
            - grace;

        let mut report = GcReport {
            dry_run,
            ..Default::default()
        };
        let mut doomed = Vec::new();
        for orphan in orphans {
            if orphan.touched_at() > cutoff {
                report.retained += 1;
                continue;
            }
            report.released_bytes += orphan.size;
            report.released.push(orphan.reference.clone());
            doomed.push(orphan.reference);
        }

        if !dry_run && !doomed.is_empty() {
            let media = Arc::clone(&self.media);
            run_blocking(move || {
                for reference in &doomed {
                    media.delete(reference)?;
                }
                Ok(())
            })
            .await?;
        }
        tracing::info!(
            op = "media.gc",
            released = report.released.len(),
            released_bytes = report.released_bytes,
            retained = report.retained,
            dry_run,
        );
        Ok(report)
    }

    pub fn grace_period(&self) -> Duration {
        self.gc.grace_period()
    }
}

async fn run_blocking<T, F>(f: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}
