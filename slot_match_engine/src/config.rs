//! Environment-driven configuration for the sweep daemon and its workers.

use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use sme_common::helpers::parse_boolean_flag;

use crate::sme_api::retry::RetryPolicy;

const DEFAULT_SLOT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_REQUEST_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 86_400;
const DEFAULT_RESPONSE_WINDOW: Duration = Duration::hours(48);
const DEFAULT_RETENTION: Duration = Duration::days(180);
const DEFAULT_REFUND_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_REFUND_BACKOFF_SECS: u64 = 5;

#[derive(Clone, Debug)]
pub struct SweepConfig {
    pub database_url: String,
    /// How often the slot sweeps (deadline and auto-match) run.
    pub slot_sweep_interval: StdDuration,
    /// How often the match request expiry sweep runs.
    pub request_sweep_interval: StdDuration,
    /// How often the retention purge runs.
    pub purge_interval: StdDuration,
    /// How long a responder has to answer a paid introduction request.
    pub response_window: Duration,
    /// How long settled bids and requests are kept before the purge removes them.
    pub retention: Duration,
    /// The retry schedule the sweep applies to failed gateway cancels.
    pub refund_retry: RetryPolicy,
    /// Apply pending migrations on startup.
    pub auto_migrate: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            slot_sweep_interval: StdDuration::from_secs(DEFAULT_SLOT_SWEEP_INTERVAL_SECS),
            request_sweep_interval: StdDuration::from_secs(DEFAULT_REQUEST_SWEEP_INTERVAL_SECS),
            purge_interval: StdDuration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
            response_window: DEFAULT_RESPONSE_WINDOW,
            retention: DEFAULT_RETENTION,
            refund_retry: RetryPolicy::new(DEFAULT_REFUND_MAX_ATTEMPTS, StdDuration::from_secs(DEFAULT_REFUND_BACKOFF_SECS)),
            auto_migrate: true,
        }
    }
}

impl SweepConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("SME_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SME_DATABASE_URL is not set. Please set it to the URL for the market database.");
            String::default()
        });
        let slot_sweep_interval =
            StdDuration::from_secs(env_u64("SME_SLOT_SWEEP_INTERVAL_SECS", DEFAULT_SLOT_SWEEP_INTERVAL_SECS));
        let request_sweep_interval =
            StdDuration::from_secs(env_u64("SME_REQUEST_SWEEP_INTERVAL_SECS", DEFAULT_REQUEST_SWEEP_INTERVAL_SECS));
        let purge_interval = StdDuration::from_secs(env_u64("SME_PURGE_INTERVAL_SECS", DEFAULT_PURGE_INTERVAL_SECS));
        let response_window =
            Duration::hours(env_i64("SME_RESPONSE_WINDOW_HOURS", DEFAULT_RESPONSE_WINDOW.num_hours()));
        let retention = Duration::days(env_i64("SME_RETENTION_DAYS", DEFAULT_RETENTION.num_days()));
        let max_attempts = env_u64("SME_REFUND_MAX_ATTEMPTS", u64::from(DEFAULT_REFUND_MAX_ATTEMPTS));
        #[allow(clippy::cast_possible_truncation)]
        let max_attempts = max_attempts.min(u64::from(u32::MAX)) as u32;
        let backoff = StdDuration::from_secs(env_u64("SME_REFUND_BACKOFF_SECS", DEFAULT_REFUND_BACKOFF_SECS));
        let auto_migrate = parse_boolean_flag(env::var("SME_AUTO_MIGRATE").ok(), true);
        Self {
            database_url,
            slot_sweep_interval,
            request_sweep_interval,
            purge_interval,
            response_window,
            retention,
            refund_retry: RetryPolicy::new(max_attempts, backoff),
            auto_migrate,
        }
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(s) => s.parse::<u64>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {var} is not set. Using the default, {default}.");
            default
        },
    }
}

fn env_i64(var: &str, default: i64) -> i64 {
    match env::var(var) {
        Ok(s) => s.parse::<i64>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {var} is not set. Using the default, {default}.");
            default
        },
    }
}
