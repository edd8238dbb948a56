//! Error types for the local store and its HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use turath_record::ValidationError;

/// Store error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid record: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row or sidecar could not be decoded.
    #[error("Corrupted data: {0}")]
    Corrupted(String),
}

impl StoreError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// True for failures of the storage medium rather than of the request.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Migration(_) | Self::Io(_) | Self::Corrupted(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupted(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        match self {
            StoreError::Validation(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": err.to_string(), "field": err.field() })),
            )
                .into_response(),
            StoreError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "error": msg }))).into_response()
            }
            StoreError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("artifact '{id}' not found") })),
            )
                .into_response(),
            StoreError::MediaNotFound(reference) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("media '{reference}' not found") })),
            )
                .into_response(),
            other => {
                tracing::error!("Storage error: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                StoreError::Validation(ValidationError::missing("id")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (StoreError::conflict("dup"), StatusCode::CONFLICT),
            (StoreError::NotFound("a1".into()), StatusCode::NOT_FOUND),
            (StoreError::MediaNotFound("sha256:00".into()), StatusCode::NOT_FOUND),
            (StoreError::corrupted("bad row"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_storage_failure_classification() {
        assert!(StoreError::corrupted("x").is_storage_failure());
        assert!(!StoreError::conflict("x").is_storage_failure());
    }
}
