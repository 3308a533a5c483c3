use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff with jitter.
///
/// `delay(attempt) = min(base * 2^(attempt-1) * (1 + jitter_unit * jitter), max)`
/// where `jitter_unit` is a caller-supplied sample in `[0, 1)`. Keeping the
/// randomness outside the type makes the schedule fully deterministic under
/// test and when `jitter_factor` is zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryStrategy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl RetryStrategy {
    /// Tool-executor defaults: 3 attempts, 500 ms base, 10 s cap, 0.2 jitter.
    pub fn tool_defaults() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter_factor: 0.2,
        }
    }

    /// Recovery defaults: 3 attempts, 1 s base, 30 s cap, 0.3 jitter.
    pub fn recovery_defaults() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_factor: 0.3,
        }
    }

    /// Delay before the given attempt (1-based).
    pub fn delay(&self, attempt: u32, jitter_unit: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base = (self.base_delay_ms as f64) * 2f64.powi(exponent as i32);
        let jittered = base * (1.0 + jitter_unit.clamp(0.0, 1.0) * self.jitter_factor);
        Duration::from_millis((jittered as u64).min(self.max_delay_ms))
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::tool_defaults()
    }
}
