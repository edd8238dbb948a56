//! Local HTTP API consumed by the field UI.

pub mod artifacts;
pub mod media;
pub mod sync;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::Catalog;
use crate::sync::SyncCoordinator;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    /// Absent when sync is not configured.
    pub sync: Option<Arc<SyncCoordinator>>,
}

impl AppState {
    pub fn new(catalog: Catalog, sync: Option<Arc<SyncCoordinator>>) -> Self {
        Self { catalog, sync }
    }
}

/// Creates the main API router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Creates the v1 API routes.
fn api_v1_routes(state: AppState) -> Router {
    Router::new()
        .nest("/artifacts", artifacts::router(state.clone()))
        .nest("/media", media::router(state.clone()))
        .nest("/sync", sync::router(state.clone()))
        .route("/stats", get(artifacts::stats).with_state(state))
}
