use webrunner_core_types::PageState;

use crate::types::{HealedSelector, HealingContext, HealingStrategy};

use super::HealingRule;

/// Score elements by proximity to the original element's last known
/// position. Weak on its own (layout shifts move everything), so the
/// confidence ceiling sits below the text and ARIA strategies.
pub(crate) struct PositionRule;

impl HealingRule for PositionRule {
    fn strategy(&self) -> HealingStrategy {
        HealingStrategy::Position
    }

    fn candidates(&self, ctx: &HealingContext, state: &PageState) -> Vec<HealedSelector> {
        let Some(bounds) = ctx.last_known_bounds else {
            return Vec::new();
        };
        let (ox, oy) = bounds.center();
        let diagonal = {
            let w = state.viewport.width as f64;
            let h = state.viewport.height as f64;
            (w * w + h * h).sqrt()
        };
        if diagonal == 0.0 {
            return Vec::new();
        }

        let mut candidates: Vec<HealedSelector> = state
            .elements
            .iter()
            .filter(|element| {
                element.bounds.width > 0.0 && element.selector != ctx.original_selector
            })
            .filter_map(|element| {
                let (ex, ey) = element.bounds.center();
                let distance = ((ex - ox).powi(2) + (ey - oy).powi(2)).sqrt();
                let proximity = 1.0 - (distance / diagonal).min(1.0);
                if proximity < 0.8 {
                    return None;
                }
                Some(HealedSelector {
                    selector: element.selector.clone(),
                    strategy: HealingStrategy::Position,
                    confidence: proximity * 0.8,
                    reasoning: format!(
                        "<{}> sits {distance:.0}px from the original element's last position",
                        element.tag
                    ),
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }
}
