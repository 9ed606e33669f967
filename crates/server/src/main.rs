mod api;
mod cli;
mod router;
mod scheduler;
mod startup;
mod state;

use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use gitfleet_core::Config;

use crate::cli::{Cli, Command};
use crate::state::AppState;

fn load_config() -> Config {
    gitfleet_core::config::load_dotenv();
    Config::from_env()
}

async fn serve(config: &Config, memory: bool) -> anyhow::Result<()> {
    config.log_summary();
    let shutdown = CancellationToken::new();
    let services = startup::build_services(config, memory, &shutdown).await?;

    let mut triggers = JoinSet::new();
    if config.schedule.enabled {
        scheduler::spawn_triggers(&mut triggers, &config.schedule, &services, &shutdown)?;
    } else {
        info!("Scheduled triggers disabled (SCHEDULER_ENABLED=false)");
    }

    let state = Arc::new(AppState {
        ingest: services.ingest.clone(),
    });
    let app = router::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    tokio::spawn(shutdown_signal(shutdown.clone()));
    let stopping = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stopping.cancelled().await })
        .await?;

    info!("HTTP server stopped; waiting for scheduled runs to drain");
    while let Some(joined) = triggers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "scheduled trigger panicked");
        }
    }
    info!("Shutdown complete");
    Ok(())
}

async fn refresh(config: &Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let services = startup::build_services(config, false, &shutdown).await?;
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let report = services.campaign.run(shutdown).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn search(config: &Config, keyword: Option<String>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let services = startup::build_services(config, false, &shutdown).await?;
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let keyword = keyword.unwrap_or_else(|| config.schedule.search_keyword.clone());
    let report = services.ingest.search_and_ingest(&keyword).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match cli.command {
        Command::Serve { memory } => serve(&config, memory).await,
        Command::Refresh => refresh(&config).await,
        Command::Search { keyword } => search(&config, keyword).await,
    }
}
