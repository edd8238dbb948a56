//! Conflict log model for writes lost to last-writer-wins.

use serde::Serialize;
use sqlx::FromRow;
use turath_record::Millis;

pub const LAST_WRITER_WINS: &str = "last-writer-wins";

/// A local write that the remote superseded.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: String,
    pub record_id: String,
    pub local_updated_at: Millis,
    pub remote_updated_at: Millis,
    /// The discarded local record, as JSON.
    pub losing_snapshot: String,
    pub strategy: String,
    pub resolved_at: Millis,
}

#[derive(Debug, Clone)]
pub struct NewSyncConflict {
    pub record_id: String,
    pub local_updated_at: Millis,
    pub remote_updated_at: Millis,
    pub losing_snapshot: String,
}
