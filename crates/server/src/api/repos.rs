//! Repository and commit endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use gitfleet_core::{Commit, Repository};

use super::ApiError;
use crate::state::AppState;

/// `GET /repos/{owner}/{repo}`: refresh from upstream and return the row.
///
/// For an already-stored repository the body is the row as it was before
/// this refresh.
pub async fn refresh_repository(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<Repository>, ApiError> {
    let repository = state.ingest.refresh_repository(&owner, &repo).await?;
    Ok(Json(repository))
}

/// `GET /commit/{owner}/{repo}`: refresh, then ingest and return the first
/// page of commits.
pub async fn ingest_commits(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<Vec<Commit>>, ApiError> {
    let commits = state.ingest.ingest_commits(&owner, &repo).await?;
    Ok(Json(commits))
}

pub async fn repositories_by_language(
    State(state): State<Arc<AppState>>,
    Path(language): Path<String>,
) -> Result<Json<Vec<Repository>>, ApiError> {
    let repositories = state.ingest.repositories_by_language(&language).await?;
    Ok(Json(repositories))
}

pub async fn top_repositories(
    State(state): State<Arc<AppState>>,
    Path(n): Path<String>,
) -> Result<Json<Vec<Repository>>, ApiError> {
    let n: u32 = n.parse().map_err(|_| ApiError::bad_request("invalid number"))?;
    let repositories = state.ingest.top_repositories_by_stars(n).await?;
    Ok(Json(repositories))
}
