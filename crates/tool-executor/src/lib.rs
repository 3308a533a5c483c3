//! Tool executor: runs a single browser tool call with bounded retries,
//! exponential backoff with jitter, per-attempt timeouts and error
//! classification.
//!
//! Idempotency is the tool's responsibility. Navigation is idempotent;
//! clicking generally is not, so click is only retried for error kinds that
//! imply the action never happened.

mod executor;

use serde::{Deserialize, Serialize};

use webrunner_core_types::RetryStrategy;

pub use executor::ToolExecutor;

/// Tool executor configuration. All knobs have defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolExecutorConfig {
    /// Total attempts including the first (1 disables retry).
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_factor: f64,
    /// Hard bound on a single attempt.
    pub attempt_timeout_s: u64,
}

impl Default for ToolExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 10_000,
            jitter_factor: 0.2,
            attempt_timeout_s: 30,
        }
    }
}

impl ToolExecutorConfig {
    pub fn retry_strategy(&self) -> RetryStrategy {
        RetryStrategy {
            max_retries: self.max_attempts,
            base_delay_ms: self.base_backoff_ms,
            max_delay_ms: self.max_backoff_ms,
            jitter_factor: self.jitter_factor,
        }
    }

    pub fn attempt_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.attempt_timeout_s)
    }
}
