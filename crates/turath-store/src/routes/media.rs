//! Binary media endpoints.
//!
//! Bodies are raw bytes, never JSON. A missing payload answers 404 so the UI
//! can fall back to its placeholder image.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use turath_record::{MediaKind, MediaRef, ValidationError};

use crate::error::StoreError;
use crate::routes::AppState;

/// Largest accepted upload (3D models and field videos are big).
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub kind: Option<String>,
}

/// Creates the media router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(upload_media))
        .route("/{reference}", get(download_media))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// POST /api/v1/media?kind=image|video|model
async fn upload_media(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, StoreError> {
    if body.is_empty() {
        return Err(ValidationError::missing("body").into());
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let kind = match params.kind.as_deref() {
        Some(raw) => raw.parse::<MediaKind>()?,
        None => content_type
            .as_deref()
            .and_then(MediaKind::from_mime)
            .ok_or_else(|| ValidationError::missing("kind"))?,
    };

    let reference = state
        .catalog
        .put_media(body.to_vec(), kind, content_type)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "reference": reference, "kind": kind })),
    ))
}

/// GET /api/v1/media/{reference}
async fn download_media(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Response, StoreError> {
    let reference: MediaRef = reference
        .parse()
        .map_err(|_| StoreError::MediaNotFound(reference.clone()))?;
    let (meta, bytes) = state.catalog.get_media(&reference).await?;

    let content_type = HeaderValue::from_str(&meta.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let mut response = bytes.into_response();
    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    Ok(response)
}
