use serde::Deserialize;

use cadence_core::config::Config;

use crate::domain::types::{DEFAULT_RATE_LIMIT, RATE_LIMIT_WINDOW_SECS, RECONCILE_DELAY_MS};
use crate::infra::gmail::DEFAULT_GMAIL_API_BASE_URL;

/// Sequencer worker configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SequencerConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL (rate-limit counters and cooldowns).
    pub redis_url: String,
    /// Public origin serving open pixels and click redirects.
    pub tracking_base_url: String,
    #[serde(default = "default_gmail_api_base_url")]
    pub gmail_api_base_url: String,

    /// Sends allowed per scope per window. Env var: `RATE_LIMIT_MAX_SENDS`.
    #[serde(default = "default_rate_limit_max_sends")]
    pub rate_limit_max_sends: u64,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    /// How long a rate-limited send waits before it is retried.
    #[serde(default = "default_rate_limit_retry_secs")]
    pub rate_limit_retry_secs: i64,

    /// Compress delays and ignore business hours.
    #[serde(default)]
    pub demo_mode: bool,
    /// Force simulated sends for every sequence.
    #[serde(default)]
    pub disable_sending: bool,

    #[serde(default = "default_send_concurrency")]
    pub send_concurrency: usize,
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_reconcile_delay_ms")]
    pub reconcile_delay_ms: u64,
    #[serde(default = "default_job_max_attempts")]
    pub job_max_attempts: i32,
    /// A claimed job is invisible to other workers for this long.
    #[serde(default = "default_job_lease_secs")]
    pub job_lease_secs: i64,
    /// Contacts pulled per sequence sweep.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u64,

    /// TCP port for `/healthz` and `/readyz` (default 3120).
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

impl Config for SequencerConfig {}

fn default_gmail_api_base_url() -> String {
    DEFAULT_GMAIL_API_BASE_URL.to_owned()
}

fn default_rate_limit_max_sends() -> u64 {
    DEFAULT_RATE_LIMIT
}

fn default_rate_limit_window_secs() -> u64 {
    RATE_LIMIT_WINDOW_SECS
}

fn default_rate_limit_retry_secs() -> i64 {
    60 * 60
}

fn default_send_concurrency() -> usize {
    5
}

fn default_sweep_concurrency() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_reconcile_delay_ms() -> u64 {
    RECONCILE_DELAY_MS
}

fn default_job_max_attempts() -> i32 {
    5
}

fn default_job_lease_secs() -> i64 {
    300
}

fn default_sweep_batch_size() -> u64 {
    100
}

fn default_health_port() -> u16 {
    3120
}
