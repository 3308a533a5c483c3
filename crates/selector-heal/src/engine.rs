use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use webrunner_core_types::PageState;

use crate::history::{HealingHistoryStore, HealingRecord};
use crate::strategies::{default_rules, HealingRule};
use crate::types::{HealedSelector, HealingContext, HealingStrategy};

/// Healing engine configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HealerConfig {
    /// Candidates below this confidence are discarded.
    pub min_confidence: f64,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.75,
        }
    }
}

/// Finds replacement selectors using the strategy stack, biased by what
/// previously worked for the same (selector, url) pair.
pub struct SelectorHealer {
    rules: Vec<Box<dyn HealingRule>>,
    history: Arc<dyn HealingHistoryStore>,
    config: HealerConfig,
}

impl SelectorHealer {
    pub fn new(history: Arc<dyn HealingHistoryStore>, config: HealerConfig) -> Self {
        Self {
            rules: default_rules(),
            history,
            config,
        }
    }

    /// Try strategies in (history-biased) priority order; the first strategy
    /// producing a candidate at or above the confidence floor wins.
    pub fn heal(&self, ctx: &HealingContext, state: &PageState) -> Option<HealedSelector> {
        let order = self.biased_order(ctx);
        for index in order {
            let rule = &self.rules[index];
            let mut candidates = rule.candidates(ctx, state);
            candidates.retain(|candidate| candidate.confidence >= self.config.min_confidence);
            if candidates.is_empty() {
                debug!(
                    target: "selector_heal",
                    strategy = %rule.strategy(),
                    selector = %ctx.original_selector,
                    "strategy produced no candidate above threshold"
                );
                continue;
            }
            candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            let best = candidates.remove(0);
            info!(
                target: "selector_heal",
                strategy = %best.strategy,
                original = %ctx.original_selector,
                healed = %best.selector,
                confidence = best.confidence,
                "selector healed"
            );
            return Some(best);
        }
        None
    }

    /// Record whether a healed selector actually worked, for future bias.
    pub fn record_outcome(&self, ctx: &HealingContext, healed: &HealedSelector, succeeded: bool) {
        self.history.append(HealingRecord {
            original_selector: ctx.original_selector.clone(),
            page_url: ctx.page_url.clone(),
            healed_selector: healed.selector.clone(),
            strategy: healed.strategy,
            confidence: healed.confidence,
            succeeded,
            timestamp: Utc::now(),
        });
    }

    /// Indices into `self.rules`: strategies with past successes for this
    /// (selector, url) pair first, then the declared order.
    fn biased_order(&self, ctx: &HealingContext) -> Vec<usize> {
        let records = self.history.query(&ctx.original_selector, &ctx.page_url);
        let mut successes: HashMap<HealingStrategy, usize> = HashMap::new();
        for record in records.iter().filter(|record| record.succeeded) {
            *successes.entry(record.strategy).or_default() += 1;
        }

        let mut order: Vec<usize> = (0..self.rules.len()).collect();
        order.sort_by_key(|&index| {
            let wins = successes
                .get(&self.rules[index].strategy())
                .copied()
                .unwrap_or(0);
            // More wins first; ties keep declared order via the index.
            (std::cmp::Reverse(wins), index)
        });
        order
    }
}
