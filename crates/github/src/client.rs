//! GitHub REST API client.
//!
//! Issues unauthenticated or token-authenticated GETs against the REST API and
//! turns quota exhaustion (`X-RateLimit-Remaining: 0` on a 403/429) into
//! [`GitHostError::RateLimited`] carrying the `X-RateLimit-Reset` epoch.

use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use gitfleet_core::config::GithubConfig;
use gitfleet_core::{RemoteCommit, RemoteRepository};

use crate::payload::{GithubCommit, GithubRepository, SearchResponse};
use crate::traits::{GitHost, GitHostError};

const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
const RETRY_AFTER_HEADER: &str = "retry-after";

/// Fetches repositories and commits from the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    base_url: String,
    token: Option<String>,
    user_agent: String,
    client: reqwest::Client,
}

impl GithubClient {
    /// Build a client from configuration. The underlying connection pool is
    /// shared by every call made through this value and its clones.
    pub fn from_config(config: &GithubConfig) -> Result<Self, GitHostError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            user_agent: config.user_agent.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GitHostError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, &self.user_agent)
            .query(query);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(url = %url, "GitHub request");
        let response = request.send().await?;
        let status = response.status();

        if let Some(reset_at) = rate_limit_reset(status, response.headers())? {
            tracing::info!(url = %url, reset_at, "GitHub rate limit exhausted");
            return Err(GitHostError::RateLimited { reset_at });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHostError::Unavailable(format!(
                "GET {url} returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| GitHostError::Unavailable(format!("malformed payload from {url}: {e}")))
    }
}

/// Detect quota exhaustion. Returns the reset epoch when the response is a
/// rate-limit rejection, `None` otherwise.
///
/// A rejection without a parseable reset epoch is reported as unavailable.
fn rate_limit_reset(status: StatusCode, headers: &HeaderMap) -> Result<Option<i64>, GitHostError> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return Ok(None);
    }

    if header_str(headers, RATE_LIMIT_REMAINING_HEADER) == Some("0") {
        let raw = header_str(headers, RATE_LIMIT_RESET_HEADER).unwrap_or("");
        return raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| GitHostError::Unavailable(format!("invalid rate limit reset header '{raw}'")));
    }

    // Secondary limits answer 429 with Retry-After seconds instead.
    if status == StatusCode::TOO_MANY_REQUESTS {
        if let Some(secs) = header_str(headers, RETRY_AFTER_HEADER).and_then(|v| v.parse::<i64>().ok()) {
            return Ok(Some(chrono::Utc::now().timestamp() + secs));
        }
    }

    Ok(None)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

#[async_trait::async_trait]
impl GitHost for GithubClient {
    async fn search_repositories(&self, keyword: &str) -> Result<Vec<RemoteRepository>, GitHostError> {
        let response: SearchResponse = self
            .get_json("/search/repositories", &[("q", keyword)])
            .await?;
        Ok(response.items.into_iter().map(RemoteRepository::from).collect())
    }

    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<RemoteRepository, GitHostError> {
        let repo: GithubRepository = self.get_json(&format!("/repos/{owner}/{name}"), &[]).await?;
        Ok(repo.into())
    }

    async fn fetch_commits(&self, owner: &str, name: &str) -> Result<Vec<RemoteCommit>, GitHostError> {
        let commits: Vec<GithubCommit> = self
            .get_json(&format!("/repos/{owner}/{name}/commits"), &[])
            .await?;
        Ok(commits.into_iter().map(RemoteCommit::from).collect())
    }

    fn host_name(&self) -> &str {
        "github"
    }
}
