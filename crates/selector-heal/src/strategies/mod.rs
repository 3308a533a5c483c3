//! Healing strategies, in declared priority order.

mod aria;
mod fuzzy;
mod position;
mod text;
mod visual;

use webrunner_core_types::PageState;

use crate::types::{HealedSelector, HealingContext, HealingStrategy};

pub(crate) use aria::AriaLabelRule;
pub(crate) use fuzzy::FuzzyAttributeRule;
pub(crate) use position::PositionRule;
pub(crate) use text::TextContentRule;
pub(crate) use visual::VisualSimilarityRule;

/// One healing strategy: emits zero or more scored candidates.
pub(crate) trait HealingRule: Send + Sync {
    fn strategy(&self) -> HealingStrategy;

    fn candidates(&self, ctx: &HealingContext, state: &PageState) -> Vec<HealedSelector>;
}

/// Default strategy stack in declared priority order.
pub(crate) fn default_rules() -> Vec<Box<dyn HealingRule>> {
    vec![
        Box::new(TextContentRule),
        Box::new(AriaLabelRule),
        Box::new(FuzzyAttributeRule),
        Box::new(PositionRule),
        Box::new(VisualSimilarityRule),
    ]
}
