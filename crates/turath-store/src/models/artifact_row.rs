//! Artifact row model: a record snapshot plus the columns lists filter on.

use serde::Serialize;
use sqlx::FromRow;
use turath_record::{ArtifactRecord, ClosedEnum, Millis};

use crate::error::{StoreError, StoreResult};

/// Represents a stored artifact row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ArtifactRow {
    /// Insertion order; also the keyset cursor for insertion-ordered lists.
    pub seq: i64,
    pub id: String,
    pub inventory_number: String,
    pub name: String,
    pub category: String,
    /// `lat-lng` key used to count distinct recorded locations.
    pub location_key: String,
    /// Full record as JSON.
    pub record_json: String,
    pub created_at: Millis,
    pub updated_at: Millis,
    /// Set while a delete is waiting for the remote acknowledgement.
    pub deleted_at: Option<Millis>,
}

/// Column values written for a record.
#[derive(Debug, Clone)]
pub struct NewArtifactRow {
    pub id: String,
    pub inventory_number: String,
    pub name: String,
    pub category: &'static str,
    pub location_key: String,
    pub search_text: String,
    pub record_json: String,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl ArtifactRow {
    /// Decodes the stored snapshot, re-checking its invariants.
    pub fn decode(&self) -> StoreResult<ArtifactRecord> {
        let record: ArtifactRecord = serde_json::from_str(&self.record_json)
            .map_err(|e| StoreError::corrupted(format!("artifact '{}': {e}", self.id)))?;
        record
            .check()
            .map_err(|e| StoreError::corrupted(format!("artifact '{}': {e}", self.id)))?;
        Ok(record)
    }

    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl NewArtifactRow {
    pub fn from_record(record: &ArtifactRecord) -> StoreResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            inventory_number: record.inventory_number.clone(),
            name: record.name.clone(),
            category: record.category.code(),
            location_key: location_key(record.gps.lat, record.gps.lng),
            search_text: record.search_text(),
            record_json: serde_json::to_string(record)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Key identifying a recorded site, matching how the dashboard counted them.
pub fn location_key(lat: f64, lng: f64) -> String {
    format!("{lat}-{lng}")
}
