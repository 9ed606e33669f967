//! HTTP router construction.

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the read API router.
///
/// The static `/repos/language/..` and `/repos/top/..` routes take precedence
/// over `/repos/{owner}/{repo}`.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/repos/language/{language}", get(api::repositories_by_language))
        .route("/repos/top/{n}", get(api::top_repositories))
        .route("/repos/{owner}/{repo}", get(api::refresh_repository))
        .route("/commit/{owner}/{repo}", get(api::ingest_commits))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET])
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS_ORIGIN; allowing any origin");
            CorsLayer::permissive()
        }
    }
}
