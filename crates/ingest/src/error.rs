//! Ingestion error types.

use thiserror::Error;

use gitfleet_store::StoreError;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Upstream failed for a reason other than rate limiting. Details are
    /// logged where the failure happens; callers only see this.
    #[error("unable to process")]
    Unavailable,

    #[error("rate limit still exhausted after {attempts} waits")]
    RateLimitBudgetExhausted { attempts: u32 },

    #[error("cancelled while waiting for rate limit reset")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
