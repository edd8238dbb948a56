//! On-disk configuration (`turath.json` in the data directory).
//!
//! Every field has a serde default, so a partial or older file still loads
//! and missing sections pick up the current defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

pub const CONFIG_FILE_NAME: &str = "turath.json";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurathConfig {
    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub media_gc: MediaGcConfig,
}

/// Remote authority and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// When false, deletes remove rows immediately and nothing is pushed.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Ledger entries examined per push pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

/// Orphaned media collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaGcConfig {
    /// Blobs younger than this survive a pass even if nothing references
    /// them yet (an upload whose record has not been saved).
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

fn default_database_file() -> String {
    "turath.sqlite".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_push_timeout_ms() -> u64 {
    10_000
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    5 * 60 * 1_000
}

fn default_batch_size() -> u32 {
    100
}

fn default_grace_period_secs() -> u64 {
    24 * 60 * 60
}

impl Default for TurathConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            media_dir: default_media_dir(),
            max_connections: default_max_connections(),
            sync: SyncConfig::default(),
            media_gc: MediaGcConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remote_url: None,
            push_timeout_ms: default_push_timeout_ms(),
            interval_ms: default_interval_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for MediaGcConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
        }
    }
}

impl TurathConfig {
    /// Loads `turath.json` from `data_dir`, writing the defaults on first run.
    pub fn load_or_init(data_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)?;
            return serde_json::from_str(&raw).map_err(|err| {
                StoreError::corrupted(format!("{}: {err}", config_path.display()))
            });
        }
        let default = Self::default();
        default.save(data_dir)?;
        Ok(default)
    }

    pub fn save(&self, data_dir: &Path) -> StoreResult<()> {
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(data_dir.join(CONFIG_FILE_NAME), payload)?;
        Ok(())
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        resolve(data_dir, &self.database_file)
    }

    pub fn media_path(&self, data_dir: &Path) -> PathBuf {
        resolve(data_dir, &self.media_dir)
    }
}

impl SyncConfig {
    /// Sync is active only when enabled and pointed at a remote.
    pub fn is_active(&self) -> bool {
        self.enabled && self.remote_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(100))
    }
}

impl MediaGcConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

fn resolve(base: &Path, value: &str) -> PathBuf {
    let candidate = PathBuf::from(value);
    if candidate.is_absolute() {
        candidate
    } else {
        base.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_init_writes_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = TurathConfig::load_or_init(tmp.path()).unwrap();
        assert_eq!(config, TurathConfig::default());
        assert!(tmp.path().join(CONFIG_FILE_NAME).exists());

        let again = TurathConfig::load_or_init(tmp.path()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{"sync": {"enabled": true, "remote_url": "http://hub.local"}}"#,
        )
        .unwrap();

        let config = TurathConfig::load_or_init(tmp.path()).unwrap();
        assert!(config.sync.is_active());
        assert_eq!(config.sync.push_timeout_ms, 10_000);
        assert_eq!(config.database_file, "turath.sqlite");
        assert_eq!(config.media_gc.grace_period_secs, 86_400);
    }

    #[test]
    fn test_enabled_without_remote_is_inactive() {
        let sync = SyncConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(!sync.is_active());
    }

    #[test]
    fn test_paths_resolve_against_data_dir() {
        let config = TurathConfig::default();
        let base = Path::new("/data");
        assert_eq!(config.database_path(base), PathBuf::from("/data/turath.sqlite"));
        assert_eq!(config.media_path(base), PathBuf::from("/data/media"));
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "{ nope").unwrap();
        assert!(matches!(
            TurathConfig::load_or_init(tmp.path()),
            Err(StoreError::Corrupted(_))
        ));
    }
}
