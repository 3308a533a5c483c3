use webrunner_core_types::PageState;

use crate::types::{HealedSelector, HealingContext, HealingStrategy};

use super::HealingRule;

/// Match against `aria-label` attributes; accessibility labels tend to
/// survive markup churn better than ids and classes.
pub(crate) struct AriaLabelRule;

impl HealingRule for AriaLabelRule {
    fn strategy(&self) -> HealingStrategy {
        HealingStrategy::AriaLabel
    }

    fn candidates(&self, ctx: &HealingContext, state: &PageState) -> Vec<HealedSelector> {
        let Some(expected) = ctx.expected_text.as_deref() else {
            return Vec::new();
        };
        let expected = expected.trim().to_lowercase();
        if expected.is_empty() {
            return Vec::new();
        }

        state
            .elements
            .iter()
            .filter_map(|element| {
                let label = element.attribute("aria-label")?.trim().to_lowercase();
                if label == expected {
                    Some(HealedSelector {
                        selector: element.selector.clone(),
                        strategy: HealingStrategy::AriaLabel,
                        confidence: 0.88,
                        reasoning: format!(
                            "aria-label of <{}> equals the expected text",
                            element.tag
                        ),
                    })
                } else if label.contains(&expected) {
                    Some(HealedSelector {
                        selector: element.selector.clone(),
                        strategy: HealingStrategy::AriaLabel,
                        confidence: 0.78,
                        reasoning: format!(
                            "aria-label of <{}> contains the expected text",
                            element.tag
                        ),
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use webrunner_core_types::InteractiveElement;

    fn labeled(selector: &str, label: &str) -> InteractiveElement {
        InteractiveElement {
            tag: "button".into(),
            selector: selector.into(),
            attributes: HashMap::from([("aria-label".to_string(), label.to_string())]),
            ..InteractiveElement::default()
        }
    }

    #[test]
    fn exact_label_beats_substring() {
        let state = PageState::new("https://mail.example", "Mail").with_elements(vec![
            labeled("button.compose", "Compose"),
            labeled("button.compose-new", "Compose new message"),
        ]);
        let ctx =
            HealingContext::new("#compose", "https://mail.example").with_expected_text("compose");

        let candidates = AriaLabelRule.candidates(&ctx, &state);
        assert_eq!(candidates.len(), 2);
        let exact = candidates
            .iter()
            .find(|c| c.selector == "button.compose")
            .unwrap();
        let partial = candidates
            .iter()
            .find(|c| c.selector == "button.compose-new")
            .unwrap();
        assert!(exact.confidence > partial.confidence);
    }

    #[test]
    fn elements_without_labels_are_skipped() {
        let state = PageState::new("https://mail.example", "Mail").with_elements(vec![
            InteractiveElement {
                selector: "button.plain".into(),
                ..InteractiveElement::default()
            },
        ]);
        let ctx =
            HealingContext::new("#compose", "https://mail.example").with_expected_text("Compose");
        assert!(AriaLabelRule.candidates(&ctx, &state).is_empty());
    }
}
