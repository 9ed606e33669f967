//! GitHost trait definition and shared error types.

use gitfleet_core::{RemoteCommit, RemoteRepository};

/// Errors surfaced by a [`GitHost`].
///
/// Callers branch only on [`GitHostError::RateLimited`]; every other failure
/// is opaque.
#[derive(Debug, thiserror::Error)]
pub enum GitHostError {
    /// Quota exhausted until `reset_at` (unix epoch seconds).
    #[error("rate limited until epoch {reset_at}")]
    RateLimited { reset_at: i64 },

    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

impl GitHostError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Reset epoch carried by a rate-limit error.
    pub fn reset_at(&self) -> Option<i64> {
        match self {
            Self::RateLimited { reset_at } => Some(*reset_at),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<reqwest::Error> for GitHostError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Read-only capability set of the source-hosting API.
#[async_trait::async_trait]
pub trait GitHost: Send + Sync {
    /// Keyword search, first result page only.
    async fn search_repositories(&self, keyword: &str) -> Result<Vec<RemoteRepository>, GitHostError>;

    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<RemoteRepository, GitHostError>;

    /// Commit listing, first page only.
    async fn fetch_commits(&self, owner: &str, name: &str) -> Result<Vec<RemoteCommit>, GitHostError>;

    /// Human-readable name for this host (e.g., "github").
    fn host_name(&self) -> &str;
}
