use webrunner_core_types::PageState;

use crate::types::{HealedSelector, HealingContext, HealingStrategy};

use super::HealingRule;

/// Exact text match against the expected text of the original element.
pub(crate) struct TextContentRule;

impl HealingRule for TextContentRule {
    fn strategy(&self) -> HealingStrategy {
        HealingStrategy::TextContent
    }

    fn candidates(&self, ctx: &HealingContext, state: &PageState) -> Vec<HealedSelector> {
        let Some(expected) = ctx.expected_text.as_deref() else {
            return Vec::new();
        };
        let expected = expected.trim();
        if expected.is_empty() {
            return Vec::new();
        }

        let matches: Vec<_> = state
            .elements
            .iter()
            .filter(|element| element.text.trim() == expected)
            .collect();

        let unique = matches.len() == 1;
        matches
            .into_iter()
            .map(|element| HealedSelector {
                selector: element.selector.clone(),
                strategy: HealingStrategy::TextContent,
                confidence: if unique { 0.95 } else { 0.85 },
                reasoning: format!(
                    "element <{}> carries the expected text {expected:?}{}",
                    element.tag,
                    if unique { " (unique match)" } else { "" }
                ),
            })
            .collect()
    }
}
