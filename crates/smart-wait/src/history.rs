use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

/// Derived statistics over a wait-sample ring, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaitStats {
    pub avg: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub stddev: f64,
    pub max: f64,
}

/// Bounded ring of wait-time samples for one action.
///
/// Immutable snapshot: [`HistoricalData::with_sample`] returns a new value,
/// so readers of a published `Arc<HistoricalData>` never block writers.
#[derive(Clone, Debug)]
pub struct HistoricalData {
    pub action: String,
    samples: VecDeque<u64>,
    cap: usize,
    pub success_count: u64,
    pub total_count: u64,
}

impl HistoricalData {
    pub fn new(action: impl Into<String>, cap: usize) -> Self {
        Self {
            action: action.into(),
            samples: VecDeque::new(),
            cap: cap.max(1),
            success_count: 0,
            total_count: 0,
        }
    }

    /// Copy-on-write append; evicts the oldest sample beyond capacity.
    pub fn with_sample(&self, duration_ms: u64, success: bool) -> Self {
        let mut next = self.clone();
        next.samples.push_back(duration_ms);
        while next.samples.len() > next.cap {
            next.samples.pop_front();
        }
        next.total_count += 1;
        if success {
            next.success_count += 1;
        }
        next
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_count as f64
    }

    pub fn stats(&self) -> Option<WaitStats> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let n = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let avg = sum as f64 / n as f64;
        let variance = sorted
            .iter()
            .map(|&sample| {
                let diff = sample as f64 - avg;
                diff * diff
            })
            .sum::<f64>()
            / n as f64;
        Some(WaitStats {
            avg,
            median: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            stddev: variance.sqrt(),
            max: sorted[n - 1] as f64,
        })
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[u64], p: f64) -> f64 {
    let n = sorted.len();
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1] as f64
}

/// Persisted smart-wait sample store. Host implementations may back this
/// with SQL; the in-memory version below is the default.
pub trait WaitHistoryStore: Send + Sync {
    fn record(&self, action: &str, duration_ms: u64, success: bool);
    fn snapshot(&self, action: &str) -> Option<Arc<HistoricalData>>;
}

/// Copy-on-write in-memory sample store.
pub struct InMemoryWaitHistory {
    cap: usize,
    entries: RwLock<HashMap<String, Arc<HistoricalData>>>,
}

impl InMemoryWaitHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl WaitHistoryStore for InMemoryWaitHistory {
    fn record(&self, action: &str, duration_ms: u64, success: bool) {
        let mut entries = self.entries.write();
        let next = match entries.get(action) {
            Some(existing) => existing.with_sample(duration_ms, success),
            None => HistoricalData::new(action, self.cap).with_sample(duration_ms, success),
        };
        entries.insert(action.to_string(), Arc::new(next));
    }

    fn snapshot(&self, action: &str) -> Option<Arc<HistoricalData>> {
        self.entries.read().get(action).cloned()
    }
}
