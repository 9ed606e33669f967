use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => true,
        Some("0") | Some("false") | Some("FALSE") | Some("no") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub github: GithubConfig,
    pub campaign: CampaignConfig,
    pub retry: RetryConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `GITFLEET_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("GITFLEET_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            github: GithubConfig::from_env_profiled(p),
            campaign: CampaignConfig::from_env_profiled(p),
            retry: RetryConfig::from_env_profiled(p),
            schedule: ScheduleConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  postgres:    configured={}, max_connections={}, min_idle={}",
            self.postgres.is_configured(),
            self.postgres.max_connections,
            self.postgres.min_idle
        );
        tracing::info!(
            "  github:      base_url={}, token={}",
            self.github.base_url,
            if self.github.token.is_some() { "set" } else { "(none)" }
        );
        tracing::info!(
            "  campaign:    page_size={}, workers={}, queue_capacity={}",
            self.campaign.page_size,
            self.campaign.workers,
            self.campaign.queue_capacity
        );
        tracing::info!(
            "  retry:       max_rate_limit_waits={}",
            self.retry
                .max_rate_limit_waits
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unbounded".to_string())
        );
        tracing::info!(
            "  schedule:    enabled={}, fleet='{}', search='{}' keyword={}",
            self.schedule.enabled,
            self.schedule.fleet_refresh_cron,
            self.schedule.search_cron,
            self.schedule.search_keyword
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8181),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: Option<String>,
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_idle: u32,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "DATABASE_URL"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 100),
            min_idle: profiled_env_u32(p, "PG_MIN_IDLE", 2),
            max_lifetime_secs: profiled_env_u64(p, "PG_MAX_LIFETIME_SECS", 3600),
            idle_timeout_secs: profiled_env_u64(p, "PG_IDLE_TIMEOUT_SECS", 600),
            acquire_timeout_secs: profiled_env_u64(p, "PG_ACQUIRE_TIMEOUT_SECS", 30),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

// ── GitHub ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl GithubConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_or(p, "GITHUB_BASE_URL", "https://api.github.com")
                .trim_end_matches('/')
                .to_string(),
            token: profiled_env_opt(p, "GITHUB_TOKEN"),
            user_agent: profiled_env_or(p, "GITHUB_USER_AGENT", "gitfleet"),
            timeout_secs: profiled_env_u64(p, "GITHUB_TIMEOUT_SECS", 30),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Fleet refresh campaign ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub page_size: u32,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            workers: 3,
            queue_capacity: 10,
        }
    }
}

impl CampaignConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            page_size: profiled_env_u32(p, "CAMPAIGN_PAGE_SIZE", defaults.page_size).max(1),
            workers: profiled_env_u32(p, "CAMPAIGN_WORKERS", defaults.workers as u32).max(1) as usize,
            queue_capacity: profiled_env_u32(p, "CAMPAIGN_QUEUE_CAPACITY", defaults.queue_capacity as u32)
                .max(1) as usize,
        }
    }
}

// ── Rate-limit retry ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    /// `None` keeps waiting for as many resets as upstream reports.
    pub max_rate_limit_waits: Option<u32>,
}

impl RetryConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_rate_limit_waits: profiled_env_opt(p, "RATE_LIMIT_MAX_WAITS").and_then(|v| v.parse().ok()),
        }
    }
}

// ── Scheduled triggers ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub fleet_refresh_cron: String,
    pub search_cron: String,
    pub search_keyword: String,
}

impl ScheduleConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(p, "SCHEDULER_ENABLED", true),
            fleet_refresh_cron: profiled_env_or(p, "FLEET_REFRESH_CRON", "0 0 */5 * * *"),
            search_cron: profiled_env_or(p, "SEARCH_CRON", "0 0 * * * *"),
            search_keyword: profiled_env_or(p, "SEARCH_KEYWORD", "cryptocurrency"),
        }
    }
}
