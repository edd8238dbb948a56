//! Sync status and manual push endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::routes::AppState;
use crate::sync::{PushReport, SyncError};

/// Creates the sync router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(sync_status))
        .route("/push", post(push_now))
        .with_state(state)
}

/// GET /api/v1/sync/status
async fn sync_status(State(state): State<AppState>) -> Result<Json<Value>, SyncError> {
    let Some(sync) = state.sync else {
        let pending = state.catalog.store().pending_count().await?;
        return Ok(Json(json!({ "enabled": false, "pending": pending })));
    };
    let status = sync.status().await?;
    Ok(Json(json!({
        "enabled": true,
        "state": status.state,
        "pending": status.pending,
        "conflicts": status.conflicts,
    })))
}

/// POST /api/v1/sync/push
///
/// Runs one push pass now instead of waiting for the background tick.
async fn push_now(State(state): State<AppState>) -> Result<Response, SyncError> {
    let Some(sync) = state.sync else {
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({ "error": "sync is not configured" })),
        )
            .into_response());
    };
    let report: PushReport = sync.push_pending().await?;
    Ok(Json(report).into_response())
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        match self {
            SyncError::Store(err) => err.into_response(),
            other => {
                tracing::warn!("Sync error: {}", other);
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": other.to_string() }))).into_response()
            }
        }
    }
}
