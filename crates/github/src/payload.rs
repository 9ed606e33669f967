//! GitHub REST response shapes and their mapping to upstream payloads.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use gitfleet_core::{RemoteCommit, RemoteRepository};

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<GithubRepository>,
}

#[derive(Debug, Deserialize)]
pub struct GithubOwner {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct GithubRepository {
    pub name: String,
    pub owner: GithubOwner,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    #[serde(default)]
    pub forks_count: i32,
    #[serde(default)]
    pub stargazers_count: i32,
    #[serde(default)]
    pub open_issues_count: i32,
    #[serde(default)]
    pub watchers_count: i32,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl From<GithubRepository> for RemoteRepository {
    fn from(r: GithubRepository) -> Self {
        Self {
            name: r.name,
            owner: r.owner.login,
            description: r.description.unwrap_or_default(),
            url: r.html_url,
            language: r.language.unwrap_or_default(),
            forks_count: r.forks_count,
            stars_count: r.stargazers_count,
            open_issues_count: r.open_issues_count,
            watchers_count: r.watchers_count,
            created_at: r.created_at.unwrap_or_default(),
            updated_at: r.updated_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GithubCommit {
    pub sha: String,
    pub commit: GithubCommitDetail,
}

#[derive(Debug, Deserialize)]
pub struct GithubCommitDetail {
    pub author: GithubCommitAuthor,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct GithubCommitAuthor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub date: DateTime<Utc>,
}

impl From<GithubCommit> for RemoteCommit {
    fn from(c: GithubCommit) -> Self {
        Self {
            sha: c.sha,
            author_name: c.commit.author.name,
            author_email: c.commit.author.email,
            message: c.commit.message,
            date: c.commit.author.date,
        }
    }
}
