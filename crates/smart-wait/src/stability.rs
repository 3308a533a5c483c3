use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use browser_agent::BrowserAgent;

use crate::adaptive::compute_timeout;
use crate::conditions::{StabilityCondition, StabilityMetrics};
use crate::errors::WaitError;
use crate::history::WaitHistoryStore;
use crate::SmartWaitConfig;

/// Options for one stability wait.
#[derive(Clone, Debug)]
pub struct StabilityOptions {
    pub max_wait_ms: u64,
    /// `true` = all conditions must hold; `false` = any single one suffices.
    pub require_all: bool,
    /// On timeout: `true` returns an error, `false` returns the last
    /// snapshot with `is_stable = false`.
    pub throw_on_timeout: bool,
}

impl Default for StabilityOptions {
    fn default() -> Self {
        Self {
            max_wait_ms: 10_000,
            require_all: true,
            throw_on_timeout: false,
        }
    }
}

/// Polls page stability conditions and computes adaptive timeouts.
pub struct SmartWaitService {
    config: SmartWaitConfig,
    history: Arc<dyn WaitHistoryStore>,
}

impl SmartWaitService {
    pub fn new(config: SmartWaitConfig, history: Arc<dyn WaitHistoryStore>) -> Self {
        Self { config, history }
    }

    pub fn config(&self) -> &SmartWaitConfig {
        &self.config
    }

    /// Poll until the conditions are met or `max_wait_ms` elapses.
    ///
    /// The returned snapshot reflects the last probe; on a non-throwing
    /// timeout its `is_stable` flag is forced to false even if individual
    /// flags settled between polls.
    pub async fn wait_for_stable_state(
        &self,
        agent: &dyn BrowserAgent,
        conditions: &[StabilityCondition],
        options: &StabilityOptions,
        ct: &CancellationToken,
    ) -> Result<StabilityMetrics, WaitError> {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(options.max_wait_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));

        loop {
            if ct.is_cancelled() {
                return Err(WaitError::Cancelled);
            }

            let state = agent.get_page_state(ct).await?;
            let metrics = StabilityMetrics::from_page_state(&state);

            let satisfied = if conditions.is_empty() {
                metrics.all_flags_stable()
            } else if options.require_all {
                conditions.iter().all(|c| c.is_satisfied(&metrics))
            } else {
                conditions.iter().any(|c| c.is_satisfied(&metrics))
            };

            if satisfied {
                let waited = started.elapsed().as_millis() as u64;
                debug!(
                    target: "smart_wait",
                    waited_ms = waited,
                    score = metrics.stability_score,
                    "stability conditions met"
                );
                self.history.record("wait_for_stable_state", waited, true);
                return Ok(metrics);
            }

            if Instant::now() >= deadline {
                let waited = started.elapsed().as_millis() as u64;
                let unmet: Vec<String> = conditions
                    .iter()
                    .filter(|c| !c.is_satisfied(&metrics))
                    .map(|c| c.label().to_string())
                    .collect();
                warn!(
                    target: "smart_wait",
                    waited_ms = waited,
                    ?unmet,
                    "stability wait timed out"
                );
                self.history.record("wait_for_stable_state", waited, false);
                if options.throw_on_timeout {
                    return Err(WaitError::Timeout {
                        waited_ms: waited,
                        unmet,
                    });
                }
                let mut snapshot = metrics;
                snapshot.is_stable = false;
                return Ok(snapshot);
            }

            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = ct.cancelled() => return Err(WaitError::Cancelled),
            }
        }
    }

    /// Adaptive timeout for an action, first attempt.
    pub fn adaptive_timeout(&self, action: &str) -> Duration {
        self.adaptive_timeout_for_attempt(action, 1)
    }

    /// Adaptive timeout for a retry attempt (backoff strategies scale).
    pub fn adaptive_timeout_for_attempt(&self, action: &str, attempt: u32) -> Duration {
        let snapshot = self.history.snapshot(action);
        compute_timeout(&self.config, snapshot.as_deref(), attempt)
    }

    /// Feed an observed wait back into the sample store.
    pub fn record_wait(&self, action: &str, duration: Duration, success: bool) {
        self.history
            .record(action, duration.as_millis() as u64, success);
    }
}
