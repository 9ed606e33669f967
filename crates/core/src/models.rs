//! Stored records and the upstream payloads they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RepositoryId = Uuid;
pub type CommitId = Uuid;

// ── Stored records ────────────────────────────────────────────

/// A tracked repository. `(owner, name)` is unique in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Repository {
    pub id: RepositoryId,
    pub name: String,
    pub owner: String,
    pub description: String,
    #[serde(rename = "html_url")]
    pub url: String,
    pub language: String,
    pub forks_count: i32,
    #[serde(rename = "stargazers_count")]
    pub stars_count: i32,
    pub open_issues_count: i32,
    pub watchers_count: i32,
    /// Upstream timestamp, stored verbatim.
    pub created_at: String,
    /// Upstream timestamp, stored verbatim.
    pub updated_at: String,
}

impl Repository {
    /// Build a record from an upstream payload under the given identifier.
    ///
    /// `owner` wins over the payload's owner so a lookup key supplied by the
    /// caller is what ends up stored.
    pub fn from_remote(id: RepositoryId, owner: &str, remote: &RemoteRepository) -> Self {
        Self {
            id,
            name: remote.name.clone(),
            owner: owner.to_string(),
            description: remote.description.clone(),
            url: remote.url.clone(),
            language: remote.language.clone(),
            forks_count: remote.forks_count,
            stars_count: remote.stars_count,
            open_issues_count: remote.open_issues_count,
            watchers_count: remote.watchers_count,
            created_at: remote.created_at.clone(),
            updated_at: remote.updated_at.clone(),
        }
    }

    /// `owner/name`, used in logs.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// One ingested commit. `repo_id` is an attribution key only; nothing cascades
/// from the repository row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Commit {
    pub id: CommitId,
    pub repo_id: RepositoryId,
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub commit_date: DateTime<Utc>,
}

impl Commit {
    /// Attribute an upstream commit to a stored repository under a fresh id.
    pub fn from_remote(repo_id: RepositoryId, remote: &RemoteCommit) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_id,
            sha: remote.sha.clone(),
            author_name: remote.author_name.clone(),
            author_email: remote.author_email.clone(),
            message: remote.message.clone(),
            commit_date: remote.date,
        }
    }
}

/// One page of the repository table plus the table's total row count.
#[derive(Debug, Clone, Default)]
pub struct RepositoryPage {
    pub repositories: Vec<Repository>,
    pub total: u64,
}

// ── Upstream payloads ─────────────────────────────────────────

/// Repository metadata as reported by the source-hosting API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub name: String,
    pub owner: String,
    pub description: String,
    pub url: String,
    pub language: String,
    pub forks_count: i32,
    pub stars_count: i32,
    pub open_issues_count: i32,
    pub watchers_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// A commit as reported by the source-hosting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommit {
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub date: DateTime<Utc>,
}
