//! Selector self-healing.
//!
//! When a selector no longer matches, the healer inspects the current page
//! snapshot and proposes a replacement: exact text match first, then ARIA
//! label, fuzzy attribute overlap, position, and finally visual similarity
//! over screenshots. Healing history biases the strategy order per
//! (selector, url) pair.

mod engine;
mod history;
mod strategies;
mod types;

pub use engine::{HealerConfig, SelectorHealer};
pub use history::{HealingHistoryStore, HealingRecord, InMemoryHealingHistory};
pub use types::{HealedSelector, HealingContext, HealingStrategy};
