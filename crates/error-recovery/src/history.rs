use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use webrunner_core_types::ErrorKind;

use crate::types::RecoveryAction;

/// One persisted recovery outcome. Only the serialized `actions` and the
/// `error_kind` string are part of the storage contract; everything else is
/// diagnostic payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub task_id: Option<String>,
    pub error_kind: ErrorKind,
    pub exception_type: String,
    pub actions: Vec<RecoveryAction>,
    pub success: bool,
    pub attempts: u32,
    pub duration_ms: u64,
    pub url: Option<String>,
    pub action: Option<String>,
    pub selector: Option<String>,
    /// Free-form context blob.
    pub context: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Persistence port for recovery outcomes.
pub trait RecoveryHistoryStore: Send + Sync {
    fn append(&self, outcome: RecoveryOutcome);

    /// The `k` action sequences with the most recorded successes for this
    /// error kind, most successful first.
    fn top_sequences(&self, kind: ErrorKind, k: usize) -> Vec<Vec<RecoveryAction>>;
}

#[derive(Default)]
pub struct InMemoryRecoveryHistory {
    outcomes: RwLock<Vec<RecoveryOutcome>>,
}

impl InMemoryRecoveryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outcomes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<RecoveryOutcome> {
        self.outcomes.read().clone()
    }
}

impl RecoveryHistoryStore for InMemoryRecoveryHistory {
    fn append(&self, outcome: RecoveryOutcome) {
        self.outcomes.write().push(outcome);
    }

    fn top_sequences(&self, kind: ErrorKind, k: usize) -> Vec<Vec<RecoveryAction>> {
        let outcomes = self.outcomes.read();
        let mut counts: HashMap<Vec<RecoveryAction>, usize> = HashMap::new();
        for outcome in outcomes
            .iter()
            .filter(|outcome| outcome.success && outcome.error_kind == kind)
        {
            *counts.entry(outcome.actions.clone()).or_default() += 1;
        }
        let mut ranked: Vec<(Vec<RecoveryAction>, usize)> = counts.into_iter().collect();
        // Ties break on the sequence itself to keep the order stable.
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(k)
            .map(|(sequence, _)| sequence)
            .collect()
    }
}
