//! Server startup: store selection, upstream client and ingest service wiring.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use gitfleet_core::Config;
use gitfleet_github::GithubClient;
use gitfleet_ingest::{FleetRefreshCampaign, IngestService, RateLimitRetry, SystemClock};
use gitfleet_store::{init_pg_pool, MemoryRepoStore, PgRepoStore, RepoStore};

/// Everything the subcommands need, built once per process.
pub struct Services {
    pub ingest: Arc<IngestService>,
    pub campaign: Arc<FleetRefreshCampaign>,
}

/// Build the store, the GitHub client and the services on top of them.
///
/// `memory` swaps PostgreSQL for an in-process store. `shutdown` interrupts
/// rate-limit waits so a pending reset cannot hold the process open.
pub async fn build_services(config: &Config, memory: bool, shutdown: &CancellationToken) -> anyhow::Result<Services> {
    let store: Arc<dyn RepoStore> = if memory {
        info!("Using in-memory repository store (data is not persisted)");
        Arc::new(MemoryRepoStore::new())
    } else {
        let pool = init_pg_pool(&config.postgres).await?;
        Arc::new(PgRepoStore::new(pool))
    };

    let client = GithubClient::from_config(&config.github)?;
    info!(base_url = %client.base_url(), "GitHub client ready");

    let retry = RateLimitRetry::new(Arc::new(SystemClock))
        .with_max_waits(config.retry.max_rate_limit_waits)
        .with_cancellation(shutdown.clone());

    let ingest = Arc::new(IngestService::new(store.clone(), Arc::new(client), retry));
    let campaign = Arc::new(FleetRefreshCampaign::new(
        store,
        ingest.clone(),
        config.campaign.clone(),
    ));

    Ok(Services { ingest, campaign })
}
