//! Database models for the local store.

pub mod artifact_row;
pub mod pending_change;
pub mod sync_conflict;

pub use artifact_row::{ArtifactRow, NewArtifactRow};
pub use pending_change::{ChangeOperation, NewPendingChange, PendingChange};
pub use sync_conflict::{NewSyncConflict, SyncConflict};
