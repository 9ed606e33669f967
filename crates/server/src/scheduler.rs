//! Cron-driven triggers for the fleet refresh campaign and keyword search.
//!
//! Each trigger is its own loop: sleep until the next fire time, run the job
//! to completion, repeat. A run that outlasts one or more fire times makes
//! those fire times pass unobserved, so runs of the same trigger never overlap.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gitfleet_core::config::ScheduleConfig;

use crate::startup::Services;

/// Parse a cron expression, auto-prepending "0 " for 5-field expressions.
///
/// The `cron` crate requires 6 fields (sec min hr dom mon dow), but 5-field
/// cron (min hr dom mon dow) is the common spelling.
pub fn parse_cron(expr: &str) -> Result<Schedule, cron::error::Error> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() == 5 {
        Schedule::from_str(&format!("0 {}", expr))
    } else {
        Schedule::from_str(expr)
    }
}

/// Spawn the fleet refresh and search triggers onto `tasks`.
///
/// An invalid cron expression is a startup error.
pub fn spawn_triggers(
    tasks: &mut JoinSet<()>,
    config: &ScheduleConfig,
    services: &Services,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    let fleet_schedule = parse_cron(&config.fleet_refresh_cron)
        .map_err(|e| anyhow::anyhow!("invalid FLEET_REFRESH_CRON '{}': {}", config.fleet_refresh_cron, e))?;
    let search_schedule = parse_cron(&config.search_cron)
        .map_err(|e| anyhow::anyhow!("invalid SEARCH_CRON '{}': {}", config.search_cron, e))?;

    let campaign = services.campaign.clone();
    let token = shutdown.clone();
    tasks.spawn(run_schedule("fleet_refresh", fleet_schedule, shutdown.clone(), move || {
        let campaign = campaign.clone();
        let token = token.clone();
        async move {
            campaign.run(token).await;
        }
    }));

    let ingest = services.ingest.clone();
    let keyword: Arc<str> = Arc::from(config.search_keyword.as_str());
    tasks.spawn(run_schedule("search", search_schedule, shutdown.clone(), move || {
        let ingest = ingest.clone();
        let keyword = keyword.clone();
        async move {
            if let Err(e) = ingest.search_and_ingest(&keyword).await {
                warn!(keyword = %keyword, error = %e, "scheduled search failed");
            }
        }
    }));

    info!(
        fleet_refresh = %config.fleet_refresh_cron,
        search = %config.search_cron,
        "Scheduled triggers started"
    );
    Ok(())
}

/// Run `job` at each fire time of `schedule` until `cancel` fires.
pub async fn run_schedule<F, Fut>(name: &'static str, schedule: Schedule, cancel: CancellationToken, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            warn!(trigger = name, "schedule has no upcoming fire time; stopping");
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        info!(trigger = name, fire_time = %next, "trigger fired");
        job().await;

        let now = Utc::now();
        let skipped = schedule.after(&next).take_while(|t| *t <= now).count();
        if skipped > 0 {
            warn!(trigger = name, skipped, "run outlasted later fire times; skipped them");
        }
    }
    info!(trigger = name, "trigger stopped");
}
