//! Pipeline configuration.
//!
//! Everything that differed between the original per-timeframe ingestion
//! scripts is configuration here: concurrency bounds and retry/backoff
//! budgets. Values come from [`PipelineConfig::default`] or an optional TOML
//! file; every field has a default so a partial file is fine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Retry/backoff budgets for one kind of fetch failure each.
///
/// Rate-limit retries and transient-error retries are counted independently:
/// a unit that was throttled twice still has its full transient budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries allowed after rate-limit signals.
    pub max_rate_limit_retries: u32,
    /// Backoff when the provider gives no resume delay.
    pub default_rate_limit_delay_secs: u64,
    /// Retries allowed after transient network failures.
    pub max_transient_retries: u32,
    /// Base delay for transient retries; doubles per attempt.
    pub transient_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            default_rate_limit_delay_secs: 15,
            max_transient_retries: 3,
            transient_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn default_rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.default_rate_limit_delay_secs)
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_millis(self.transient_backoff_ms)
    }
}

/// Knobs for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrently in-flight fetches (network-bound).
    pub fetch_concurrency: usize,
    /// Concurrently in-flight partition writes (disk-bound).
    pub write_concurrency: usize,
    /// Retry/backoff budgets shared by every unit.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 20,
            write_concurrency: 8,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a config from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}
