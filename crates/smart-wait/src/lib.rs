//! Smart waiting: multi-condition page-stability polling and adaptive
//! timeouts computed from historical wait samples.

mod adaptive;
mod conditions;
mod errors;
mod history;
mod stability;

use serde::{Deserialize, Serialize};

pub use adaptive::TimeoutStrategy;
pub use conditions::{StabilityCondition, StabilityMetrics};
pub use errors::WaitError;
pub use history::{HistoricalData, InMemoryWaitHistory, WaitHistoryStore, WaitStats};
pub use stability::{SmartWaitService, StabilityOptions};

/// Smart wait configuration. All knobs have defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartWaitConfig {
    pub default_timeout_ms: u64,
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub safety_multiplier: f64,
    /// Ring-buffer capacity per action.
    pub max_samples: usize,
    /// Below this sample count the default timeout is used.
    pub min_samples_for_sufficient: usize,
    pub poll_interval_ms: u64,
    pub strategy: TimeoutStrategy,
}

impl Default for SmartWaitConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            min_timeout_ms: 1_000,
            max_timeout_ms: 60_000,
            safety_multiplier: 1.5,
            max_samples: 100,
            min_samples_for_sufficient: 10,
            poll_interval_ms: 100,
            strategy: TimeoutStrategy::Percentile,
        }
    }
}
