//! Fleet refresh: walk every stored repository page by page and refresh each
//! one's commits on a fixed pool of workers.
//!
//! ```text
//!   driver ──page──▶ [ bounded queue ] ──▶ worker 0..N ──▶ RepositoryRefresher
//!     ▲                                         │
//!     └────────── need-more-work (cap 1) ◀──────┘  (sent when queue looks empty)
//! ```
//!
//! The driver enqueues page 1, then fetches the next page each time a worker
//! reports that the queue looks empty. Signals that arrive while one is
//! already pending are dropped. The driver stops when the page counter passes
//! `total / page_size` (integer division, so a partial last page is not
//! visited), when a page comes back empty, when a page fetch fails, or on
//! cancellation. It then closes the queue; workers drain what is left and
//! exit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use gitfleet_core::config::CampaignConfig;
use gitfleet_core::Repository;
use gitfleet_store::RepoStore;

use crate::error::IngestError;

/// Per-repository work done by a campaign worker.
#[async_trait]
pub trait RepositoryRefresher: Send + Sync {
    async fn refresh(&self, repo: &Repository) -> Result<(), IngestError>;
}

/// Summary of one campaign run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    /// `total / page_size` as computed from the first page.
    pub total_pages: u64,
    pub pages_fetched: u64,
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Items still queued when the workers stopped (non-zero only on cancel).
    pub abandoned: u64,
    pub queue_closed: bool,
    pub cancelled: bool,
    pub page_error: Option<String>,
}

#[derive(Debug, Default)]
struct WorkerCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Default)]
struct DriverOutcome {
    total_pages: u64,
    pages_fetched: u64,
    enqueued: u64,
    page_error: Option<String>,
}

pub struct FleetRefreshCampaign {
    store: Arc<dyn RepoStore>,
    refresher: Arc<dyn RepositoryRefresher>,
    config: CampaignConfig,
}

impl FleetRefreshCampaign {
    pub fn new(store: Arc<dyn RepoStore>, refresher: Arc<dyn RepositoryRefresher>, config: CampaignConfig) -> Self {
        Self {
            store,
            refresher,
            config,
        }
    }

    /// Run one campaign to completion or until `cancel` fires.
    ///
    /// A failed page fetch ends the campaign early but is not an error of the
    /// run itself; it is logged and recorded in [`CampaignReport::page_error`].
    pub async fn run(&self, cancel: CancellationToken) -> CampaignReport {
        let started = Instant::now();
        let page_size = self.config.page_size.max(1);
        let (queue_tx, queue_rx) = async_channel::bounded::<Repository>(self.config.queue_capacity.max(1));
        let (more_tx, more_rx) = mpsc::channel::<()>(1);
        let counters = Arc::new(WorkerCounters::default());

        info!(
            page_size,
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            "Fleet refresh campaign starting"
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers.max(1) {
            workers.spawn(run_worker(
                worker_id,
                queue_rx.clone(),
                more_tx.clone(),
                self.refresher.clone(),
                counters.clone(),
                cancel.clone(),
            ));
        }
        drop(more_tx);

        let outcome = drive_pages(self.store.as_ref(), page_size, queue_tx, more_rx, &cancel).await;

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "campaign worker panicked");
            }
        }

        let report = CampaignReport {
            total_pages: outcome.total_pages,
            pages_fetched: outcome.pages_fetched,
            enqueued: outcome.enqueued,
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            abandoned: queue_rx.len() as u64,
            queue_closed: queue_rx.is_closed(),
            cancelled: cancel.is_cancelled(),
            page_error: outcome.page_error,
        };
        info!(
            total_pages = report.total_pages,
            pages_fetched = report.pages_fetched,
            enqueued = report.enqueued,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fleet refresh campaign finished"
        );
        report
    }
}

/// Page count used to bound the walk. Truncating: 23 rows at 10 per page is 2.
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    total / u64::from(page_size.max(1))
}

async fn drive_pages(
    store: &dyn RepoStore,
    page_size: u32,
    queue: async_channel::Sender<Repository>,
    mut more: mpsc::Receiver<()>,
    cancel: &CancellationToken,
) -> DriverOutcome {
    let mut outcome = DriverOutcome::default();

    let first = match store.list_repositories(page_size, 1).await {
        Ok(page) => page,
        Err(e) => {
            error!(page = 1, error = %e, "failed to fetch repository page; terminating campaign");
            outcome.page_error = Some(e.to_string());
            queue.close();
            return outcome;
        }
    };
    outcome.total_pages = total_pages(first.total, page_size);
    outcome.pages_fetched = 1;
    debug!(total = first.total, total_pages = outcome.total_pages, "first page fetched");

    let mut keep_going = !first.repositories.is_empty()
        && enqueue(&queue, first.repositories, cancel, &mut outcome.enqueued).await;
    let mut next_page: u32 = 2;

    while keep_going {
        let signalled = tokio::select! {
            _ = cancel.cancelled() => None,
            signal = more.recv() => signal,
        };
        if signalled.is_none() {
            break;
        }
        if u64::from(next_page) > outcome.total_pages {
            debug!(page = next_page, total_pages = outcome.total_pages, "no more pages to fetch");
            break;
        }

        match store.list_repositories(page_size, next_page).await {
            Ok(page) => {
                outcome.pages_fetched += 1;
                debug!(page = next_page, repositories = page.repositories.len(), "page fetched");
                keep_going = !page.repositories.is_empty()
                    && enqueue(&queue, page.repositories, cancel, &mut outcome.enqueued).await;
                next_page += 1;
            }
            Err(e) => {
                error!(page = next_page, error = %e, "failed to fetch repository page; terminating campaign");
                outcome.page_error = Some(e.to_string());
                keep_going = false;
            }
        }
    }

    queue.close();
    outcome
}

/// Push a page onto the queue, blocking while it is full. Returns `false` if
/// the campaign was cancelled or every worker is gone.
async fn enqueue(
    queue: &async_channel::Sender<Repository>,
    repositories: Vec<Repository>,
    cancel: &CancellationToken,
    enqueued: &mut u64,
) -> bool {
    for repo in repositories {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            sent = queue.send(repo) => {
                if sent.is_err() {
                    return false;
                }
                *enqueued += 1;
            }
        }
    }
    true
}

async fn run_worker(
    worker_id: usize,
    queue: async_channel::Receiver<Repository>,
    more: mpsc::Sender<()>,
    refresher: Arc<dyn RepositoryRefresher>,
    counters: Arc<WorkerCounters>,
    cancel: CancellationToken,
) {
    loop {
        let repo = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Ok(repo) => repo,
                // Closed and drained.
                Err(_) => break,
            },
        };

        match refresher.refresh(&repo).await {
            Ok(()) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker = worker_id,
                    repository = %repo.full_name(),
                    error = %e,
                    "failed to refresh repository"
                );
            }
        }

        if queue.is_empty() {
            // Full means a request is already pending; closed means the driver is done.
            let _ = more.try_send(());
        }
    }
    debug!(worker = worker_id, "campaign worker exiting");
}
