//! In-process [`RepoStore`] with the same uniqueness and paging rules as the
//! PostgreSQL schema.

use std::sync::RwLock;

use async_trait::async_trait;

use gitfleet_core::{Commit, Repository, RepositoryId, RepositoryPage};

use crate::error::StoreError;
use crate::traits::{page_offset, RepoStore};

#[derive(Debug, Default)]
struct MemoryState {
    repositories: Vec<Repository>,
    commits: Vec<Commit>,
}

/// Keeps repositories and commits in memory. Repositories are listed ordered
/// by `(owner, name)`, matching [`crate::PgRepoStore`].
#[derive(Debug, Default)]
pub struct MemoryRepoStore {
    state: RwLock<MemoryState>,
}

impl MemoryRepoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored repositories.
    pub fn repository_count(&self) -> usize {
        self.state.read().unwrap_or_else(|e| e.into_inner()).repositories.len()
    }

    /// Number of stored commit rows, duplicates included.
    pub fn commit_count(&self) -> usize {
        self.state.read().unwrap_or_else(|e| e.into_inner()).commits.len()
    }
}

fn sort_key(repo: &Repository) -> (&str, &str) {
    (repo.owner.as_str(), repo.name.as_str())
}

#[async_trait]
impl RepoStore for MemoryRepoStore {
    async fn create_repository(&self, repo: &Repository) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state
            .repositories
            .iter()
            .any(|r| r.owner == repo.owner && r.name == repo.name)
        {
            return Err(StoreError::Duplicate {
                owner: repo.owner.clone(),
                name: repo.name.clone(),
            });
        }
        let at = state
            .repositories
            .partition_point(|r| sort_key(r) < sort_key(repo));
        state.repositories.insert(at, repo.clone());
        Ok(())
    }

    async fn update_repository(&self, repo: &Repository) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state
            .repositories
            .iter()
            .any(|r| r.id != repo.id && r.owner == repo.owner && r.name == repo.name)
        {
            return Err(StoreError::Duplicate {
                owner: repo.owner.clone(),
                name: repo.name.clone(),
            });
        }
        // Like an UPDATE ... WHERE id = $1, a missing row is not an error.
        if let Some(existing) = state.repositories.iter_mut().find(|r| r.id == repo.id) {
            *existing = repo.clone();
        }
        state
            .repositories
            .sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Ok(())
    }

    async fn create_commits(&self, commits: &[Commit]) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.commits.extend_from_slice(commits);
        Ok(())
    }

    async fn find_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .repositories
            .iter()
            .find(|r| r.owner == owner && r.name == name)
            .cloned())
    }

    async fn list_repositories(&self, page_size: u32, page: u32) -> Result<RepositoryPage, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let offset = page_offset(page_size, page) as usize;
        let repositories = state
            .repositories
            .iter()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(RepositoryPage {
            repositories,
            total: state.repositories.len() as u64,
        })
    }

    async fn repositories_by_language(&self, language: &str) -> Result<Vec<Repository>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .repositories
            .iter()
            .filter(|r| r.language == language)
            .cloned()
            .collect())
    }

    async fn top_repositories_by_stars(&self, n: u32) -> Result<Vec<Repository>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut repos = state.repositories.clone();
        repos.sort_by(|a, b| b.stars_count.cmp(&a.stars_count));
        repos.truncate(n as usize);
        Ok(repos)
    }

    async fn commits_for_repository(&self, repo_id: RepositoryId) -> Result<Vec<Commit>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .commits
            .iter()
            .filter(|c| c.repo_id == repo_id)
            .cloned()
            .collect())
    }
}
