//! Ingestion core: pulls repository and commit metadata from a [`GitHost`]
//! and reconciles it into a [`RepoStore`].
//!
//! - [`retry`]: rate-limit-aware retry around every upstream call
//! - [`reconcile`]: create-vs-update decision keyed by `(owner, name)`
//! - [`service`]: single-repository refresh, commit ingestion, keyword search
//! - [`campaign`]: paginated fleet refresh over a bounded worker pool
//!
//! [`GitHost`]: gitfleet_github::GitHost
//! [`RepoStore`]: gitfleet_store::RepoStore

pub mod campaign;
pub mod error;
pub mod reconcile;
pub mod retry;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use campaign::{CampaignReport, FleetRefreshCampaign, RepositoryRefresher};
pub use error::IngestError;
pub use reconcile::UpsertOutcome;
pub use retry::{Clock, RateLimitRetry, SystemClock};
pub use service::{IngestService, SearchReport};
