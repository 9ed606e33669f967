//! Fakes shared by this crate's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use gitfleet_core::{Commit, RemoteCommit, RemoteRepository, Repository, RepositoryId, RepositoryPage};
use gitfleet_github::{GitHost, GitHostError};
use gitfleet_store::{MemoryRepoStore, RepoStore, StoreError};

use crate::campaign::RepositoryRefresher;
use crate::error::IngestError;
use crate::retry::Clock;

/// Clock whose sleeps return immediately and advance "now".
pub(crate) struct FakeClock {
    now: AtomicI64,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn at(epoch: i64) -> Self {
        Self {
            now: AtomicI64::new(epoch),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().into_iter().sum()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now_epoch(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.now.fetch_add(duration.as_secs() as i64, Ordering::SeqCst);
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Scriptable upstream host.
#[derive(Default)]
pub(crate) struct FakeHost {
    repositories: Mutex<HashMap<(String, String), RemoteRepository>>,
    commits: Mutex<Vec<RemoteCommit>>,
    search_results: Mutex<Vec<RemoteRepository>>,
    rate_limits: AtomicU32,
    reset_at: AtomicI64,
    unavailable: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(self, remote: RemoteRepository) -> Self {
        self.set_repository(remote);
        self
    }

    pub fn set_repository(&self, remote: RemoteRepository) {
        self.repositories
            .lock()
            .unwrap()
            .insert((remote.owner.clone(), remote.name.clone()), remote);
    }

    pub fn with_commits(self, commits: Vec<RemoteCommit>) -> Self {
        *self.commits.lock().unwrap() = commits;
        self
    }

    pub fn with_search_results(self, results: Vec<RemoteRepository>) -> Self {
        *self.search_results.lock().unwrap() = results;
        self
    }

    /// The next `count` calls answer `RateLimited { reset_at }`.
    pub fn rate_limit_next(&self, count: u32, reset_at: i64) {
        self.reset_at.store(reset_at, Ordering::SeqCst);
        self.rate_limits.store(count, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn gate(&self) -> Result<(), GitHostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GitHostError::Unavailable("status 500".into()));
        }
        let limited = self
            .rate_limits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if limited {
            return Err(GitHostError::RateLimited {
                reset_at: self.reset_at.load(Ordering::SeqCst),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GitHost for FakeHost {
    async fn search_repositories(&self, _keyword: &str) -> Result<Vec<RemoteRepository>, GitHostError> {
        self.gate()?;
        Ok(self.search_results.lock().unwrap().clone())
    }

    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<RemoteRepository, GitHostError> {
        self.gate()?;
        // GitHub matches owner and name case-insensitively.
        self.repositories
            .lock()
            .unwrap()
            .iter()
            .find(|((o, n), _)| o.eq_ignore_ascii_case(owner) && n.eq_ignore_ascii_case(name))
            .map(|(_, remote)| remote.clone())
            .ok_or_else(|| GitHostError::Unavailable("status 404".into()))
    }

    async fn fetch_commits(&self, _owner: &str, _name: &str) -> Result<Vec<RemoteCommit>, GitHostError> {
        self.gate()?;
        Ok(self.commits.lock().unwrap().clone())
    }

    fn host_name(&self) -> &str {
        "fake"
    }
}

pub(crate) fn remote_repo(owner: &str, name: &str) -> RemoteRepository {
    RemoteRepository {
        name: name.to_string(),
        owner: owner.to_string(),
        description: format!("{name} description"),
        url: format!("https://github.com/{owner}/{name}"),
        language: "Rust".to_string(),
        forks_count: 1,
        stars_count: 10,
        open_issues_count: 0,
        watchers_count: 10,
        created_at: "2020-01-01T00:00:00Z".to_string(),
        updated_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

pub(crate) fn remote_commit(sha: &str) -> RemoteCommit {
    RemoteCommit {
        sha: sha.to_string(),
        author_name: "Dev".to_string(),
        author_email: "dev@example.com".to_string(),
        message: format!("commit {sha}"),
        date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

/// Records every repository it is asked to refresh.
#[derive(Default)]
pub(crate) struct RecordingRefresher {
    seen: Mutex<Vec<String>>,
    fail_on: HashSet<String>,
}

impl RecordingRefresher {
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail_on: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryRefresher for RecordingRefresher {
    async fn refresh(&self, repo: &Repository) -> Result<(), IngestError> {
        self.seen.lock().unwrap().push(repo.name.clone());
        tokio::task::yield_now().await;
        if self.fail_on.contains(&repo.name) {
            return Err(IngestError::Unavailable);
        }
        Ok(())
    }
}

/// Memory store that fails writes for chosen repository names and, when
/// asked, page listings from a given page on.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryRepoStore,
    fail_writes_for: HashSet<String>,
    fail_pages_from: Option<u32>,
}

impl FlakyStore {
    pub fn failing_writes_for(names: &[&str]) -> Self {
        Self {
            fail_writes_for: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_pages_from(page: u32) -> Self {
        Self {
            fail_pages_from: Some(page),
            ..Self::default()
        }
    }

    fn check_write(&self, repo: &Repository) -> Result<(), StoreError> {
        if self.fail_writes_for.contains(&repo.name) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl RepoStore for FlakyStore {
    async fn create_repository(&self, repo: &Repository) -> Result<(), StoreError> {
        self.check_write(repo)?;
        self.inner.create_repository(repo).await
    }

    async fn update_repository(&self, repo: &Repository) -> Result<(), StoreError> {
        self.check_write(repo)?;
        self.inner.update_repository(repo).await
    }

    async fn create_commits(&self, commits: &[Commit]) -> Result<(), StoreError> {
        self.inner.create_commits(commits).await
    }

    async fn find_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>, StoreError> {
        self.inner.find_repository(owner, name).await
    }

    async fn list_repositories(&self, page_size: u32, page: u32) -> Result<RepositoryPage, StoreError> {
        if self.fail_pages_from.is_some_and(|from| page >= from) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.list_repositories(page_size, page).await
    }

    async fn repositories_by_language(&self, language: &str) -> Result<Vec<Repository>, StoreError> {
        self.inner.repositories_by_language(language).await
    }

    async fn top_repositories_by_stars(&self, n: u32) -> Result<Vec<Repository>, StoreError> {
        self.inner.top_repositories_by_stars(n).await
    }

    async fn commits_for_repository(&self, repo_id: RepositoryId) -> Result<Vec<Commit>, StoreError> {
        self.inner.commits_for_repository(repo_id).await
    }
}

/// Seed `count` repositories named `repo-00`, `repo-01`, ... under one owner.
pub(crate) async fn seed(store: &dyn RepoStore, count: usize) {
    for i in 0..count {
        let remote = remote_repo("fleet", &format!("repo-{i:02}"));
        let repo = Repository::from_remote(uuid::Uuid::new_v4(), "fleet", &remote);
        store.create_repository(&repo).await.unwrap();
    }
}
