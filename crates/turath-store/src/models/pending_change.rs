//! Pending-change ledger model.
//!
//! Every local mutation appends one entry in the same transaction as the
//! record write. Entries leave the ledger only when the remote acknowledges
//! them.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use turath_record::{ArtifactRecord, Millis};

use crate::error::{StoreError, StoreResult};

/// Kind of local mutation recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Represents a ledger entry awaiting acknowledgement.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PendingChange {
    /// Ledger sequence; the push order.
    pub seq: i64,
    pub record_id: String,
    pub operation: ChangeOperation,
    /// Record as it was when the change was made (the last state for deletes).
    pub payload_json: Option<String>,
    pub recorded_at: Millis,
    /// Failed push attempts so far.
    pub attempts: i64,
    /// Earliest time the next attempt may run.
    pub next_attempt_at: Millis,
    pub last_error: Option<String>,
}

/// Data required to append a ledger entry.
#[derive(Debug, Clone)]
pub struct NewPendingChange {
    pub record_id: String,
    pub operation: ChangeOperation,
    pub payload_json: Option<String>,
    pub recorded_at: Millis,
}

impl NewPendingChange {
    pub fn for_record(
        operation: ChangeOperation,
        record: &ArtifactRecord,
        recorded_at: Millis,
    ) -> StoreResult<Self> {
        Ok(Self {
            record_id: record.id.clone(),
            operation,
            payload_json: Some(serde_json::to_string(record)?),
            recorded_at,
        })
    }
}

impl PendingChange {
    pub fn snapshot(&self) -> StoreResult<Option<ArtifactRecord>> {
        self.payload_json
            .as_deref()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| {
                    StoreError::corrupted(format!("ledger entry {}: {e}", self.seq))
                })
            })
            .transpose()
    }

    /// True when the entry is still waiting out its backoff.
    pub fn is_deferred(&self, now: Millis) -> bool {
        self.next_attempt_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serialization() {
        assert_eq!(
            serde_json::to_string(&ChangeOperation::Delete).unwrap(),
            "\"delete\""
        );
        assert_eq!(ChangeOperation::Create.as_str(), "create");
    }

    #[test]
    fn test_deferral() {
        let change = PendingChange {
            seq: 1,
            record_id: "a1".to_string(),
            operation: ChangeOperation::Update,
            payload_json: None,
            recorded_at: 10,
            attempts: 1,
            next_attempt_at: 500,
            last_error: Some("timeout".to_string()),
        };
        assert!(change.is_deferred(499));
        assert!(!change.is_deferred(500));
        assert!(change.snapshot().unwrap().is_none());
    }
}
