//! Artifact record endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use turath_record::{apply_suggestion, ArtifactDraft, ArtifactRecord, ClosedEnum, HeritageCategory, SuggestedFields};

use crate::catalog::CatalogStats;
use crate::error::StoreError;
use crate::listing::{ListQuery, SortOrder};
use crate::routes::AppState;
use crate::store::WriteOptions;

/// `?force=true` saves despite an inventory-number collision.
#[derive(Debug, Default, Deserialize)]
pub struct SaveParams {
    #[serde(default)]
    pub force: bool,
}

impl SaveParams {
    fn options(&self) -> WriteOptions {
        WriteOptions {
            allow_duplicate_inventory_number: self.force,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
    pub limit: Option<u32>,
}

/// One page of a listing.
#[derive(Serialize)]
pub struct ListResponse {
    pub total: i64,
    pub items: Vec<ArtifactRecord>,
}

#[derive(Deserialize)]
pub struct SuggestionRequest {
    pub draft: ArtifactDraft,
    pub suggestion: SuggestedFields,
}

/// Creates the artifacts router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_artifact).get(list_artifacts))
        .route("/suggestions", post(merge_suggestion))
        .route(
            "/{id}",
            get(get_artifact).put(update_artifact).delete(delete_artifact),
        )
        .with_state(state)
}

/// POST /api/v1/artifacts
///
/// Validates a draft and stores it as a new record.
async fn create_artifact(
    State(state): State<AppState>,
    Query(params): Query<SaveParams>,
    Json(draft): Json<ArtifactDraft>,
) -> Result<(StatusCode, Json<ArtifactRecord>), StoreError> {
    let record = state
        .catalog
        .create_from_draft(draft, params.options())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/artifacts
async fn list_artifacts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, StoreError> {
    let category = params
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(HeritageCategory::parse)
        .transpose()?;

    let mut cursor = state
        .catalog
        .store()
        .list(ListQuery {
            category,
            search: params.q,
            sort: params.sort,
            page_size: params.limit,
        })
        .await?;
    let items = cursor.next_page().await?;
    let total = cursor.total();
    cursor.close().await?;

    Ok(Json(ListResponse { total, items }))
}

/// GET /api/v1/artifacts/{id}
async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArtifactRecord>, StoreError> {
    Ok(Json(state.catalog.store().get(&id).await?))
}

/// PUT /api/v1/artifacts/{id}
///
/// Full replace; the stored id and creation time win over the body.
async fn update_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SaveParams>,
    Json(draft): Json<ArtifactDraft>,
) -> Result<Json<ArtifactRecord>, StoreError> {
    let record = state
        .catalog
        .update_from_draft(&id, draft, params.options())
        .await?;
    Ok(Json(record))
}

/// DELETE /api/v1/artifacts/{id}
async fn delete_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StoreError> {
    state.catalog.store().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/artifacts/suggestions
///
/// Merges an image-analysis suggestion into a draft without saving it.
async fn merge_suggestion(Json(request): Json<SuggestionRequest>) -> Result<Json<Value>, StoreError> {
    let merged = apply_suggestion(request.draft, &request.suggestion)?;
    let rejected: Vec<Value> = merged
        .rejected
        .iter()
        .map(|err| json!({ "field": err.field(), "error": err.to_string() }))
        .collect();

    Ok(Json(json!({
        "draft": merged.draft,
        "applied": merged.applied,
        "rejected": rejected,
    })))
}

/// GET /api/v1/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<CatalogStats>, StoreError> {
    Ok(Json(state.catalog.stats().await?))
}
