//! Content-addressed binary media store.
//!
//! Layout: `<root>/<prefix>/<sha256>/blob` plus `blob.meta.json`, where
//! `prefix` is the first four hex characters of the digest. The blob is
//! written to a temporary file and renamed into place; the sidecar is written
//! last, so a directory without a sidecar is an interrupted write and is
//! ignored by reads and overwritten by the next put.
//!
//! Storing bytes that are already present refreshes `lastPutAt`, so a photo
//! re-attached to an unsaved draft gets a fresh grace period.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use turath_record::{MediaKind, MediaRef};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};

const BLOB_FILE: &str = "blob";
const METADATA_FILE: &str = "blob.meta.json";

/// Sidecar metadata for a stored payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub reference: MediaRef,
    pub kind: MediaKind,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    /// Latest put of these bytes, when later than `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_put_at: Option<DateTime<Utc>>,
}

impl MediaMetadata {
    /// When the payload was last stored; the GC grace period counts from here.
    pub fn touched_at(&self) -> DateTime<Utc> {
        self.last_put_at.map_or(self.created_at, |at| at.max(self.created_at))
    }
}

/// Storage for media payloads, isolated from record metadata.
pub trait MediaStore: Send + Sync {
    /// Stores `bytes` under its content reference; identical bytes are stored once.
    fn put_typed(&self, bytes: &[u8], kind: MediaKind, content_type: &str) -> StoreResult<MediaRef>;

    fn get(&self, reference: &MediaRef) -> StoreResult<Vec<u8>>;

    fn head(&self, reference: &MediaRef) -> StoreResult<MediaMetadata>;

    /// Removes a payload. Removing an absent payload succeeds.
    fn delete(&self, reference: &MediaRef) -> StoreResult<()>;

    /// Metadata of every complete payload.
    fn list(&self) -> StoreResult<Vec<MediaMetadata>>;

    fn put(&self, bytes: &[u8], kind: MediaKind) -> StoreResult<MediaRef> {
        self.put_typed(bytes, kind, kind.default_mime())
    }

    /// Payloads referenced by nothing in `live`.
    fn list_orphans(&self, live: &HashSet<MediaRef>) -> StoreResult<Vec<MediaMetadata>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|meta| !live.contains(&meta.reference))
            .collect())
    }

    /// Total payload bytes held.
    fn stored_bytes(&self) -> StoreResult<u64> {
        Ok(self.list()?.iter().map(|meta| meta.size).sum())
    }
}

/// Filesystem-backed media store.
pub struct FilesystemMediaStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FilesystemMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamps sidecars from `clock` instead of the system time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build payload directory path: <root>/<prefix>/<sha256>/
    fn blob_dir(&self, reference: &MediaRef) -> PathBuf {
        let digest = reference.digest();
        self.root.join(&digest[..4]).join(digest)
    }

    fn blob_path(&self, reference: &MediaRef) -> PathBuf {
        self.blob_dir(reference).join(BLOB_FILE)
    }

    fn meta_path(&self, reference: &MediaRef) -> PathBuf {
        self.blob_dir(reference).join(METADATA_FILE)
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_millis()).unwrap_or_else(Utc::now)
    }

    fn write_metadata(&self, metadata: &MediaMetadata) -> StoreResult<()> {
        write_atomic(
            &self.meta_path(&metadata.reference),
            serde_json::to_string_pretty(metadata)?.as_bytes(),
        )
    }
}

impl MediaStore for FilesystemMediaStore {
    fn put_typed(&self, bytes: &[u8], kind: MediaKind, content_type: &str) -> StoreResult<MediaRef> {
        let reference = MediaRef::for_content(bytes);

        let now = self.now();

        if self.meta_path(&reference).exists() {
            let mut metadata = self.head(&reference)?;
            metadata.last_put_at = Some(now);
            self.write_metadata(&metadata)?;
            info!(op = "media.put.dedup", reference = %reference, "Media already stored");
            return Ok(reference);
        }

        let dir = self.blob_dir(&reference);
        fs::create_dir_all(&dir)?;
        write_atomic(&self.blob_path(&reference), bytes)?;

        let metadata = MediaMetadata {
            reference: reference.clone(),
            kind,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            created_at: now,
            last_put_at: None,
        };
        self.write_metadata(&metadata)?;

        info!(op = "media.put.ok", reference = %reference, kind = kind.as_str(), bytes = bytes.len());
        Ok(reference)
    }

    fn get(&self, reference: &MediaRef) -> StoreResult<Vec<u8>> {
        // Sidecar presence marks a complete write
        self.head(reference)?;
        match fs::read(self.blob_path(reference)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::MediaNotFound(reference.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn head(&self, reference: &MediaRef) -> StoreResult<MediaMetadata> {
        let meta_path = self.meta_path(reference);
        if !meta_path.exists() {
            return Err(StoreError::MediaNotFound(reference.to_string()));
        }
        let raw = fs::read_to_string(&meta_path)?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::corrupted(format!("{}: {e}", meta_path.display())))
    }

    fn delete(&self, reference: &MediaRef) -> StoreResult<()> {
        let dir = self.blob_dir(reference);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!(op = "media.delete.ok", reference = %reference);
        }
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<MediaMetadata>> {
        let mut found = Vec::new();
        if !self.root.is_dir() {
            return Ok(found);
        }
        for prefix in fs::read_dir(&self.root)? {
            let prefix = prefix?.path();
            if !prefix.is_dir() {
                continue;
            }
            for blob_dir in fs::read_dir(&prefix)? {
                let meta_path = blob_dir?.path().join(METADATA_FILE);
                if !meta_path.is_file() {
                    continue;
                }
                let raw = fs::read_to_string(&meta_path)?;
                match serde_json::from_str::<MediaMetadata>(&raw) {
                    Ok(meta) => found.push(meta),
                    Err(err) => {
                        tracing::warn!(path = %meta_path.display(), error = %err, "Skipping unreadable media sidecar");
                    }
                }
            }
        }
        found.sort_by(|a, b| a.reference.cmp(&b.reference));
        Ok(found)
    }
}

/// Writes to a sibling temp file, then renames over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    fs::write(&tmp, bytes)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemMediaStore::new(tmp.path());

        let reference = store.put(b"jpeg bytes", MediaKind::Image).unwrap();
        assert_eq!(store.get(&reference).unwrap(), b"jpeg bytes");

        let meta = store.head(&reference).unwrap();
        assert_eq!(meta.kind, MediaKind::Image);
        assert_eq!(meta.size, 10);
        assert_eq!(meta.content_type, "image/jpeg");

        let digest = reference.digest();
        assert!(tmp.path().join(&digest[..4]).join(digest).join("blob").is_file());
    }

    #[test]
    fn test_dedup_keeps_one_copy() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemMediaStore::new(tmp.path());

        let a = store.put(b"same photo", MediaKind::Image).unwrap();
        let b = store.put(b"same photo", MediaKind::Image).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.stored_bytes().unwrap(), 10);
    }

    #[test]
    fn test_dedup_refreshes_last_put() {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = FilesystemMediaStore::new(tmp.path()).with_clock(clock.clone());

        let reference = store.put(b"same photo", MediaKind::Image).unwrap();
        let first = store.head(&reference).unwrap();
        assert_eq!(first.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(first.touched_at(), first.created_at);

        clock.advance(3 * 24 * 60 * 60 * 1000);
        store.put(b"same photo", MediaKind::Image).unwrap();
        let again = store.head(&reference).unwrap();
        assert_eq!(again.created_at, first.created_at);
        assert_eq!(again.touched_at().timestamp_millis(), clock.now_millis());
    }

    #[test]
    fn test_sidecar_without_last_put_still_reads() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemMediaStore::new(tmp.path());
        let reference = store.put(b"older sidecar", MediaKind::Image).unwrap();

        let raw = fs::read_to_string(store.meta_path(&reference)).unwrap();
        assert!(!raw.contains("lastPutAt"));
        let meta = store.head(&reference).unwrap();
        assert_eq!(meta.touched_at(), meta.created_at);
    }

    #[test]
    fn test_missing_media_is_distinct_error() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemMediaStore::new(tmp.path());
        let reference = MediaRef::for_content(b"never stored");

        assert!(matches!(store.get(&reference), Err(StoreError::MediaNotFound(_))));
        assert!(matches!(store.head(&reference), Err(StoreError::MediaNotFound(_))));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemMediaStore::new(tmp.path());
        let reference = store.put(b"video", MediaKind::Video).unwrap();

        store.delete(&reference).unwrap();
        store.delete(&reference).unwrap();
        assert!(matches!(store.get(&reference), Err(StoreError::MediaNotFound(_))));
    }

    #[test]
    fn test_interrupted_write_is_invisible_and_repaired() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemMediaStore::new(tmp.path());
        let reference = MediaRef::for_content(b"partial");

        // Blob landed, sidecar never did
        fs::create_dir_all(store.blob_dir(&reference)).unwrap();
        fs::write(store.blob_path(&reference), b"part").unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(store.get(&reference), Err(StoreError::MediaNotFound(_))));

        store.put(b"partial", MediaKind::Model).unwrap();
        assert_eq!(store.get(&reference).unwrap(), b"partial");
    }

    #[test]
    fn test_list_orphans() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemMediaStore::new(tmp.path());
        let kept = store.put(b"kept", MediaKind::Image).unwrap();
        let orphan = store.put(b"orphan", MediaKind::Image).unwrap();

        let live = HashSet::from([kept]);
        let orphans = store.list_orphans(&live).unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].reference, orphan);
    }
}
