//! Store contract consumed by the ingestion core.

use async_trait::async_trait;

use gitfleet_core::{Commit, Repository, RepositoryId, RepositoryPage};

use crate::error::StoreError;

/// Persistent store for repositories and their commits.
///
/// Lookups take `(owner, name)` in that order everywhere. No method spans
/// more than one statement's worth of atomicity: a lookup followed by a write
/// can race with a concurrent writer, and the `(owner, name)` uniqueness
/// constraint is what settles a duplicate create.
#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn create_repository(&self, repo: &Repository) -> Result<(), StoreError>;

    /// Overwrite every mutable column of the row with `repo.id`.
    async fn update_repository(&self, repo: &Repository) -> Result<(), StoreError>;

    /// Insert a batch of commits in one call. An empty batch is a no-op.
    async fn create_commits(&self, commits: &[Commit]) -> Result<(), StoreError>;

    /// Point lookup; `Ok(None)` when nothing matches.
    async fn find_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>, StoreError>;

    /// One page (1-based) of at most `page_size` repositories, plus the table's
    /// total row count.
    async fn list_repositories(&self, page_size: u32, page: u32) -> Result<RepositoryPage, StoreError>;

    async fn repositories_by_language(&self, language: &str) -> Result<Vec<Repository>, StoreError>;

    /// The `n` most-starred repositories, most stars first.
    async fn top_repositories_by_stars(&self, n: u32) -> Result<Vec<Repository>, StoreError>;

    async fn commits_for_repository(&self, repo_id: RepositoryId) -> Result<Vec<Commit>, StoreError>;
}

/// Row offset of a 1-based page.
pub(crate) fn page_offset(page_size: u32, page: u32) -> u64 {
    u64::from(page_size) * u64::from(page.max(1) - 1)
}
