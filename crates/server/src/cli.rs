//! CLI argument parsing.

use clap::{Parser, Subcommand};

/// gitfleet: ingest GitHub repository and commit metadata and serve it over HTTP.
#[derive(Parser, Debug)]
#[command(name = "gitfleet-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP read API and the scheduled triggers.
    Serve {
        /// Keep data in memory instead of PostgreSQL.
        #[arg(long)]
        memory: bool,
    },
    /// Run one fleet refresh campaign and print its report.
    Refresh,
    /// Run one keyword search ingestion and print its report.
    Search {
        /// Search keyword (defaults to SEARCH_KEYWORD).
        keyword: Option<String>,
    },
}
