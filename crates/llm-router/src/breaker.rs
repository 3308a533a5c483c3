use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Circuit breaker state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests pass; consecutive failures are counted.
    Closed,
    /// Requests are blocked until the open window elapses.
    Open,
    /// A single probe request is allowed through.
    HalfOpen,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_duration_s: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_s: 30,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_secs(self.open_duration_s)
    }
}

/// Snapshot of breaker internals for diagnostics.
#[derive(Clone, Debug)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_kind: Option<String>,
    pub last_failure_age: Option<Duration>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    last_failure_kind: Option<String>,
    probe_in_flight: bool,
}

/// Per-provider failure accounting.
///
/// `record_success` and `record_failure` are the only mutators besides the
/// administrative `reset`; `is_request_allowed` performs the timed
/// Open -> HalfOpen transition.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_duration: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            open_duration,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                last_failure_at: None,
                last_failure_kind: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(name, config.failure_threshold, config.open_duration())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a request may pass right now. In Open state this flips to
    /// HalfOpen once the open window has elapsed; in HalfOpen exactly one
    /// probe is allowed until its outcome is recorded.
    pub fn is_request_allowed(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.open_duration)
                    .unwrap_or(true);
                if elapsed {
                    info!(
                        target: "circuit_breaker",
                        provider = %self.name,
                        "open window elapsed; allowing half-open probe"
                    );
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(
                target: "circuit_breaker",
                provider = %self.name,
                "probe succeeded; closing circuit"
            );
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    pub fn record_failure(&self, kind: &str) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());
        inner.last_failure_kind = Some(kind.to_string());
        inner.probe_in_flight = false;

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.consecutive_failures >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if should_open {
            warn!(
                target: "circuit_breaker",
                provider = %self.name,
                failures = inner.consecutive_failures,
                kind,
                "opening circuit"
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Administrative reset back to Closed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.last_failure_at = None;
        inner.last_failure_kind = None;
        inner.probe_in_flight = false;
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_kind: inner.last_failure_kind.clone(),
            last_failure_age: inner.last_failure_at.map(|at| at.elapsed()),
        }
    }
}

/// Concurrent registry of breakers keyed by provider name.
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn for_provider(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::from_config(name, &self.config)))
            .clone()
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, open_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new("test", threshold, Duration::from_millis(open_ms))
    }

    #[test]
    fn opens_exactly_at_threshold() {
        let breaker = breaker(3, 1_000);
        breaker.record_failure("http");
        breaker.record_failure("http");
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure("http");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_request_allowed());
    }

    #[test]
    fn threshold_one_opens_on_first_failure() {
        let breaker = breaker(1, 1_000);
        breaker.record_failure("timeout");
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_the_counter() {
        let breaker = breaker(3, 1_000);
        breaker.record_failure("http");
        breaker.record_failure("http");
        breaker.record_success();
        breaker.record_failure("http");
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.stats().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn open_window_elapses_into_half_open_single_probe() {
        let breaker = breaker(1, 20);
        breaker.record_failure("http");
        assert!(!breaker.is_request_allowed());

        tokio::time::sleep(Duration::from_millis(30)).await;
        // First call after the window transitions to HalfOpen and admits one.
        assert!(breaker.is_request_allowed());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        // The probe is in flight; nothing else passes.
        assert!(!breaker.is_request_allowed());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.is_request_allowed());
    }

    #[tokio::test]
    async fn failed_probe_reopens_with_fresh_timer() {
        let breaker = breaker(1, 20);
        breaker.record_failure("http");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(breaker.is_request_allowed());

        breaker.record_failure("http");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_request_allowed());
    }

    #[test]
    fn reset_clears_everything() {
        let breaker = breaker(1, 60_000);
        breaker.record_failure("http");
        assert_eq!(breaker.state(), CircuitState::Open);
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.is_request_allowed());
        assert!(breaker.stats().last_failure_kind.is_none());
    }

    #[test]
    fn registry_returns_the_same_breaker_per_name() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
        let a = registry.for_provider("openai");
        let b = registry.for_provider("openai");
        a.record_failure("http");
        assert_eq!(b.stats().consecutive_failures, 1);
    }
}
