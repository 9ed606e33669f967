//! Ingestion operations over a [`GitHost`] and a [`RepoStore`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use gitfleet_core::{Commit, Repository};
use gitfleet_github::GitHost;
use gitfleet_store::RepoStore;

use crate::campaign::RepositoryRefresher;
use crate::error::IngestError;
use crate::reconcile::{self, UpsertOutcome};
use crate::retry::RateLimitRetry;

/// Outcome of one keyword search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub keyword: String,
    pub found: usize,
    pub created: usize,
    pub updated: usize,
    /// `owner/name` of every item that could not be stored.
    pub failed: Vec<String>,
}

pub struct IngestService {
    store: Arc<dyn RepoStore>,
    host: Arc<dyn GitHost>,
    retry: RateLimitRetry,
}

impl IngestService {
    pub fn new(store: Arc<dyn RepoStore>, host: Arc<dyn GitHost>, retry: RateLimitRetry) -> Self {
        Self { store, host, retry }
    }

    pub fn store(&self) -> &Arc<dyn RepoStore> {
        &self.store
    }

    /// Fetch `owner/name` upstream and upsert it.
    ///
    /// Returns the newly created row, or, when the repository was already
    /// stored, the row as it was *before* this refresh overwrote it.
    pub async fn refresh_repository(&self, owner: &str, name: &str) -> Result<Repository, IngestError> {
        validate_slug(owner, name)?;
        let existing = self.store.find_repository(owner, name).await?;

        let remote = self
            .retry
            .run("fetch_repository", || self.host.fetch_repository(owner, name))
            .await?;

        // Upstream resolves names case-insensitively and follows renames, so
        // the stored row may be keyed by the payload's name instead.
        let existing = match existing {
            None if remote.name != name => self.store.find_repository(owner, &remote.name).await?,
            found => found,
        };

        let outcome = reconcile::apply(self.store.as_ref(), existing, owner, &remote).await?;
        debug!(
            repository = %outcome.current().full_name(),
            created = outcome.is_created(),
            "repository refreshed"
        );
        Ok(outcome.into_refresh_result())
    }

    /// Refresh `owner/name`, then store the first page of its upstream
    /// commits. Every call appends; a commit already stored is stored again.
    pub async fn ingest_commits(&self, owner: &str, name: &str) -> Result<Vec<Commit>, IngestError> {
        let repo = self.refresh_repository(owner, name).await?;

        let remote_commits = self
            .retry
            .run("fetch_commits", || self.host.fetch_commits(owner, name))
            .await?;

        let commits: Vec<Commit> = remote_commits
            .iter()
            .map(|c| Commit::from_remote(repo.id, c))
            .collect();
        self.store.create_commits(&commits).await?;

        debug!(repository = %repo.full_name(), commits = commits.len(), "commits ingested");
        Ok(commits)
    }

    /// Search upstream for `keyword` and upsert every first-page result.
    ///
    /// A failure to store one result is logged and recorded in the report;
    /// the remaining results are still processed. Only a failed search call
    /// fails the whole operation.
    pub async fn search_and_ingest(&self, keyword: &str) -> Result<SearchReport, IngestError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(IngestError::InvalidInput("search keyword is empty".to_string()));
        }

        let started = Instant::now();
        let results = self
            .retry
            .run("search_repositories", || self.host.search_repositories(keyword))
            .await?;

        let mut report = SearchReport {
            keyword: keyword.to_string(),
            found: results.len(),
            ..SearchReport::default()
        };

        for remote in &results {
            match reconcile::upsert(self.store.as_ref(), &remote.owner, remote).await {
                Ok(UpsertOutcome::Created(_)) => report.created += 1,
                Ok(UpsertOutcome::Updated { .. }) => report.updated += 1,
                Err(e) => {
                    warn!(
                        owner = %remote.owner,
                        name = %remote.name,
                        error = %e,
                        "failed to store search result"
                    );
                    report.failed.push(format!("{}/{}", remote.owner, remote.name));
                }
            }
        }

        info!(
            keyword,
            host = self.host.host_name(),
            found = report.found,
            created = report.created,
            updated = report.updated,
            failed = report.failed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search ingestion complete"
        );
        Ok(report)
    }

    pub async fn find_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>, IngestError> {
        Ok(self.store.find_repository(owner, name).await?)
    }

    pub async fn repositories_by_language(&self, language: &str) -> Result<Vec<Repository>, IngestError> {
        Ok(self.store.repositories_by_language(language).await?)
    }

    pub async fn top_repositories_by_stars(&self, n: u32) -> Result<Vec<Repository>, IngestError> {
        Ok(self.store.top_repositories_by_stars(n).await?)
    }
}

#[async_trait]
impl RepositoryRefresher for IngestService {
    async fn refresh(&self, repo: &Repository) -> Result<(), IngestError> {
        self.ingest_commits(&repo.owner, &repo.name).await.map(|_| ())
    }
}

fn validate_slug(owner: &str, name: &str) -> Result<(), IngestError> {
    let invalid = |part: &str| part.trim().is_empty() || part.contains('/');
    if invalid(owner) || invalid(name) {
        return Err(IngestError::InvalidInput(format!(
            "repository must be owner/name, got {owner:?}/{name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{remote_commit, remote_repo, FakeClock, FakeHost, FlakyStore};
    use gitfleet_store::MemoryRepoStore;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn service(store: Arc<dyn RepoStore>, host: Arc<FakeHost>) -> (IngestService, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::at(1_000));
        let retry = RateLimitRetry::new(clock.clone());
        (IngestService::new(store, host, retry), clock)
    }

    #[tokio::test]
    async fn refresh_creates_then_is_idempotent() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(FakeHost::new().with_repository(remote_repo("bitcoin", "bitcoin")));
        let (svc, _) = service(store.clone(), host);

        let first = svc.refresh_repository("bitcoin", "bitcoin").await.unwrap();
        let second = svc.refresh_repository("bitcoin", "bitcoin").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.repository_count(), 1);
        assert_eq!(second.owner, "bitcoin");
        assert_eq!(second.url, "https://github.com/bitcoin/bitcoin");
    }

    #[tokio::test]
    async fn refresh_of_existing_returns_pre_update_snapshot() {
        let store = Arc::new(MemoryRepoStore::new());
        let mut remote = remote_repo("o", "n");
        remote.description = "old".into();
        let host = Arc::new(FakeHost::new().with_repository(remote.clone()));
        let (svc, _) = service(store.clone(), host.clone());
        svc.refresh_repository("o", "n").await.unwrap();

        remote.description = "new".into();
        host.set_repository(remote);
        let returned = svc.refresh_repository("o", "n").await.unwrap();

        assert_eq!(returned.description, "old");
        let stored = store.find_repository("o", "n").await.unwrap().unwrap();
        assert_eq!(stored.description, "new");
        assert_eq!(stored.id, returned.id);
    }

    #[tokio::test]
    async fn refresh_waits_out_rate_limit() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(FakeHost::new().with_repository(remote_repo("o", "n")));
        host.rate_limit_next(2, 1_030);
        let (svc, clock) = service(store.clone(), host.clone());

        let repo = svc.refresh_repository("o", "n").await.unwrap();

        assert_eq!(repo.name, "n");
        assert_eq!(host.calls.load(Ordering::SeqCst), 3);
        assert!(clock.total_slept() >= Duration::from_secs(30));
        assert_eq!(store.repository_count(), 1);
    }

    #[tokio::test]
    async fn refresh_upstream_failure_writes_nothing() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(FakeHost::new().with_repository(remote_repo("o", "n")));
        host.set_unavailable(true);
        let (svc, _) = service(store.clone(), host);

        let err = svc.refresh_repository("o", "n").await.unwrap_err();

        assert_eq!(err.to_string(), "unable to process");
        assert_eq!(store.repository_count(), 0);
    }

    #[tokio::test]
    async fn refresh_rejects_empty_slug() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(FakeHost::new());
        let (svc, _) = service(store, host.clone());

        let err = svc.refresh_repository("", "n").await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
        assert_eq!(host.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_with_differently_cased_name_updates_stored_row() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(FakeHost::new().with_repository(remote_repo("bitcoin", "bitcoin")));
        let (svc, _) = service(store.clone(), host);

        let first = svc.refresh_repository("bitcoin", "bitcoin").await.unwrap();
        let second = svc.refresh_repository("bitcoin", "Bitcoin").await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "bitcoin");
        assert_eq!(store.repository_count(), 1);
    }

    #[tokio::test]
    async fn refresh_rejects_slash_in_owner_or_name() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(FakeHost::new().with_repository(remote_repo("a", "b")));
        let (svc, _) = service(store.clone(), host.clone());

        let err = svc.refresh_repository("a/b", "c").await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
        let err = svc.ingest_commits("a", "b/../c").await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
        assert_eq!(host.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.repository_count(), 0);
    }

    #[tokio::test]
    async fn commits_are_appended_on_every_ingest() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(
            FakeHost::new()
                .with_repository(remote_repo("o", "n"))
                .with_commits(vec![remote_commit("a1"), remote_commit("b2"), remote_commit("c3")]),
        );
        let (svc, _) = service(store.clone(), host);

        let first = svc.ingest_commits("o", "n").await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(store.commit_count(), 3);

        svc.ingest_commits("o", "n").await.unwrap();
        assert_eq!(store.commit_count(), 6);

        let repo = store.find_repository("o", "n").await.unwrap().unwrap();
        let stored = store.commits_for_repository(repo.id).await.unwrap();
        assert_eq!(stored.len(), 6);
        assert_eq!(stored.iter().filter(|c| c.sha == "a1").count(), 2);
    }

    #[tokio::test]
    async fn commits_without_upstream_history_store_nothing() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(FakeHost::new().with_repository(remote_repo("o", "n")));
        let (svc, _) = service(store.clone(), host);

        assert!(svc.ingest_commits("o", "n").await.unwrap().is_empty());
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.repository_count(), 1);
    }

    #[tokio::test]
    async fn search_continues_past_a_failed_item() {
        let results: Vec<_> = (1..=5).map(|i| remote_repo("crypto", &format!("coin-{i}"))).collect();
        let store = Arc::new(FlakyStore::failing_writes_for(&["coin-3"]));
        let host = Arc::new(FakeHost::new().with_search_results(results));
        let (svc, _) = service(store.clone(), host);

        let report = svc.search_and_ingest("cryptocurrency").await.unwrap();

        assert_eq!(report.found, 5);
        assert_eq!(report.created, 4);
        assert_eq!(report.failed, vec!["crypto/coin-3".to_string()]);
        assert_eq!(store.inner.repository_count(), 4);
        assert!(store.inner.find_repository("crypto", "coin-5").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn search_updates_known_repositories_with_upstream_values() {
        let store = Arc::new(MemoryRepoStore::new());
        let mut remote = remote_repo("crypto", "coin");
        let host = Arc::new(FakeHost::new().with_search_results(vec![remote.clone()]));
        let (svc, _) = service(store.clone(), host);
        svc.search_and_ingest("coin").await.unwrap();
        let id = store.find_repository("crypto", "coin").await.unwrap().unwrap().id;

        remote.stars_count = 4_242;
        let host = Arc::new(FakeHost::new().with_search_results(vec![remote]));
        let (svc, _) = service(store.clone(), host);
        let report = svc.search_and_ingest("coin").await.unwrap();

        assert_eq!(report.updated, 1);
        let stored = store.find_repository("crypto", "coin").await.unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.stars_count, 4_242);
    }

    #[tokio::test]
    async fn search_failure_is_reported_and_empty_keyword_rejected() {
        let store = Arc::new(MemoryRepoStore::new());
        let host = Arc::new(FakeHost::new());
        host.set_unavailable(true);
        let (svc, _) = service(store, host);

        assert!(matches!(
            svc.search_and_ingest("coin").await.unwrap_err(),
            IngestError::Unavailable
        ));
        assert!(matches!(
            svc.search_and_ingest("  ").await.unwrap_err(),
            IngestError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn reads_go_to_the_store() {
        let store = Arc::new(MemoryRepoStore::new());
        let results = vec![remote_repo("a", "x"), remote_repo("a", "y")];
        let host = Arc::new(FakeHost::new().with_search_results(results));
        let (svc, _) = service(store, host);
        svc.search_and_ingest("k").await.unwrap();

        assert_eq!(svc.repositories_by_language("Rust").await.unwrap().len(), 2);
        assert!(svc.repositories_by_language("COBOL").await.unwrap().is_empty());
        assert_eq!(svc.top_repositories_by_stars(1).await.unwrap().len(), 1);
        assert!(svc.find_repository("a", "x").await.unwrap().is_some());
    }
}
