use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::HistoricalData;
use crate::SmartWaitConfig;

/// How an adaptive timeout is derived from the sample ring.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutStrategy {
    /// Largest observed sample.
    Fixed,
    /// Average plus one standard deviation.
    Adaptive,
    /// 95th percentile.
    Percentile,
    /// Average scaled by `2^(attempt-1)`.
    ExponentialBackoff,
    /// Average scaled linearly by attempt.
    LinearBackoff,
}

/// Compute a timeout for the given attempt (1-based), applying the safety
/// multiplier and clamping to the configured bounds. Insufficient history
/// falls back to the default timeout.
pub(crate) fn compute_timeout(
    config: &SmartWaitConfig,
    data: Option<&HistoricalData>,
    attempt: u32,
) -> Duration {
    let Some(data) = data else {
        return Duration::from_millis(config.default_timeout_ms);
    };
    if data.len() < config.min_samples_for_sufficient {
        return Duration::from_millis(config.default_timeout_ms);
    }
    let Some(stats) = data.stats() else {
        return Duration::from_millis(config.default_timeout_ms);
    };

    let attempt = attempt.max(1);
    let base = match config.strategy {
        TimeoutStrategy::Fixed => stats.max,
        TimeoutStrategy::Adaptive => stats.avg + stats.stddev,
        TimeoutStrategy::Percentile => stats.p95,
        TimeoutStrategy::ExponentialBackoff => {
            stats.avg * 2f64.powi(attempt.saturating_sub(1).min(16) as i32)
        }
        TimeoutStrategy::LinearBackoff => stats.avg * attempt as f64,
    };

    let scaled = (base * config.safety_multiplier) as u64;
    Duration::from_millis(scaled.clamp(config.min_timeout_ms, config.max_timeout_ms))
}
