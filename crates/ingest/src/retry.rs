//! Rate-limit-aware retry around upstream calls.
//!
//! Every [`GitHost`](gitfleet_github::GitHost) call made by the ingestion core
//! goes through [`RateLimitRetry::run`]. A `RateLimited` response suspends the
//! caller until the advertised reset instant and then re-issues the identical
//! call. Any other upstream failure is logged and collapsed into
//! [`IngestError::Unavailable`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gitfleet_github::GitHostError;

use crate::error::IngestError;

/// Added on top of the advertised reset so the retry lands after it.
const RESET_SLACK: Duration = Duration::from_secs(1);

/// Source of "now" and of suspension.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current unix epoch, in seconds.
    fn now_epoch(&self) -> i64;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `chrono` and `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_epoch(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry policy for rate-limited upstream calls.
///
/// Unbounded by default. [`with_max_waits`](Self::with_max_waits) caps the
/// number of suspensions, and [`with_cancellation`](Self::with_cancellation)
/// lets shutdown interrupt a suspension.
#[derive(Clone)]
pub struct RateLimitRetry {
    clock: Arc<dyn Clock>,
    max_waits: Option<u32>,
    slack: Duration,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for RateLimitRetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitRetry")
            .field("max_waits", &self.max_waits)
            .field("slack", &self.slack)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl Default for RateLimitRetry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RateLimitRetry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            max_waits: None,
            slack: RESET_SLACK,
            cancel: None,
        }
    }

    /// Give up after `max_waits` suspensions. `None` retries forever.
    pub fn with_max_waits(mut self, max_waits: Option<u32>) -> Self {
        self.max_waits = max_waits;
        self
    }

    pub fn with_slack(mut self, slack: Duration) -> Self {
        self.slack = slack;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// How long to suspend for a reset at `reset_at`. A reset already in the
    /// past still waits the slack.
    pub fn wait_for(&self, reset_at: i64) -> Duration {
        let remaining = reset_at.saturating_sub(self.clock.now_epoch()).max(0);
        Duration::from_secs(remaining as u64) + self.slack
    }

    /// Run `call` until it returns something other than `RateLimited`.
    ///
    /// `operation` only labels log lines.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, IngestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GitHostError>>,
    {
        let mut waits: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(GitHostError::RateLimited { reset_at }) => {
                    if let Some(max) = self.max_waits {
                        if waits >= max {
                            warn!(operation, reset_at, waits, "rate limit wait budget exhausted");
                            return Err(IngestError::RateLimitBudgetExhausted { attempts: waits });
                        }
                    }
                    waits += 1;
                    let wait = self.wait_for(reset_at);
                    info!(
                        operation,
                        reset_at,
                        wait_secs = wait.as_secs(),
                        attempt = waits,
                        "Rate limited, waiting for reset"
                    );
                    self.suspend(wait).await?;
                }
                Err(e) => {
                    warn!(operation, error = %e, "upstream call failed");
                    return Err(IngestError::Unavailable);
                }
            }
        }
    }

    async fn suspend(&self, wait: Duration) -> Result<(), IngestError> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(IngestError::Cancelled),
                    _ = self.clock.sleep(wait) => Ok(()),
                }
            }
            None => {
                self.clock.sleep(wait).await;
                Ok(())
            }
        }
    }
}
