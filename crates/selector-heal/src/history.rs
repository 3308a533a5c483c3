use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::HealingStrategy;

/// One persisted healing attempt, keyed by (original selector, page url).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealingRecord {
    pub original_selector: String,
    pub page_url: String,
    pub healed_selector: String,
    pub strategy: HealingStrategy,
    pub confidence: f64,
    pub succeeded: bool,
    pub timestamp: DateTime<Utc>,
}

/// Persistence port for healing outcomes. Storage is host-defined; the
/// in-memory version below is the default.
pub trait HealingHistoryStore: Send + Sync {
    fn append(&self, record: HealingRecord);
    fn query(&self, original_selector: &str, page_url: &str) -> Vec<HealingRecord>;
}

#[derive(Default)]
pub struct InMemoryHealingHistory {
    records: RwLock<Vec<HealingRecord>>,
}

impl InMemoryHealingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl HealingHistoryStore for InMemoryHealingHistory {
    fn append(&self, record: HealingRecord) {
        self.records.write().push(record);
    }

    fn query(&self, original_selector: &str, page_url: &str) -> Vec<HealingRecord> {
        self.records
            .read()
            .iter()
            .filter(|record| {
                record.original_selector == original_selector && record.page_url == page_url
            })
            .cloned()
            .collect()
    }
}
