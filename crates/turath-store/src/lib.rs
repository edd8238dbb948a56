//! Turath Store - offline-first persistence for heritage artifact records
//!
//! This crate holds the local SQLite store with its pending-change ledger,
//! the content-addressed media store, the sync coordinator that drains the
//! ledger to a remote authority, and the local HTTP API the field UI talks to.

pub mod analysis;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod listing;
pub mod media;
pub mod models;
pub mod routes;
pub mod store;
pub mod sync;

pub use analysis::AnalysisTracker;
pub use catalog::{Catalog, CatalogStats, GcReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MediaGcConfig, SyncConfig, TurathConfig};
pub use error::{StoreError, StoreResult};
pub use listing::{ListQuery, RecordCursor, SortOrder};
pub use media::{FilesystemMediaStore, MediaMetadata, MediaStore};
pub use routes::{create_router, AppState};
pub use store::{DeleteMode, LocalStore, StoreStats, WriteOptions};
pub use sync::{HttpRemote, PushReport, RemoteAuthority, SyncCoordinator, SyncError, SyncState};
