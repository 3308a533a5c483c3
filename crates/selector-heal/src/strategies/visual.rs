use image::{imageops::FilterType, DynamicImage, GenericImageView};
use tracing::debug;

use webrunner_core_types::{ElementBounds, PageState};

use crate::types::{HealedSelector, HealingContext, HealingStrategy};

use super::HealingRule;

const THUMB_SIZE: u32 = 8;

/// Compare candidate element crops against a baseline screenshot of the
/// original element. Similarity is the mean of a global SSIM over 8x8
/// luminance thumbnails and the normalized average-hash distance.
pub(crate) struct VisualSimilarityRule;

impl HealingRule for VisualSimilarityRule {
    fn strategy(&self) -> HealingStrategy {
        HealingStrategy::VisualSimilarity
    }

    fn candidates(&self, ctx: &HealingContext, state: &PageState) -> Vec<HealedSelector> {
        let (Some(baseline_png), Some(current_png)) =
            (&ctx.baseline_screenshot, &ctx.current_screenshot)
        else {
            return Vec::new();
        };
        let Ok(baseline) = image::load_from_memory(baseline_png) else {
            debug!(target: "selector_heal", "baseline screenshot failed to decode");
            return Vec::new();
        };
        let Ok(current) = image::load_from_memory(current_png) else {
            debug!(target: "selector_heal", "current screenshot failed to decode");
            return Vec::new();
        };

        // A full-page baseline is cropped to the original element's last
        // known position; pre-cropped baselines pass through unchanged.
        let baseline = match ctx
            .last_known_bounds
            .and_then(|bounds| crop_bounds(&baseline, bounds))
        {
            Some(crop) => crop,
            None => baseline,
        };
        let baseline_thumb = luminance_thumb(&baseline);
        let mut candidates: Vec<HealedSelector> = state
            .elements
            .iter()
            .filter(|element| element.selector != ctx.original_selector)
            .filter_map(|element| {
                let crop = crop_bounds(&current, element.bounds)?;
                let crop_thumb = luminance_thumb(&crop);
                let score = (ssim(&baseline_thumb, &crop_thumb)
                    + hash_similarity(&baseline_thumb, &crop_thumb))
                    / 2.0;
                if score < 0.6 {
                    return None;
                }
                Some(HealedSelector {
                    selector: element.selector.clone(),
                    strategy: HealingStrategy::VisualSimilarity,
                    confidence: (0.5 + 0.45 * score).min(0.9),
                    reasoning: format!(
                        "<{}> looks {:.0}% like the original element's screenshot",
                        element.tag,
                        score * 100.0
                    ),
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }
}

fn crop_bounds(img: &DynamicImage, bounds: ElementBounds) -> Option<DynamicImage> {
    if bounds.width < 1.0 || bounds.height < 1.0 {
        return None;
    }
    let (img_w, img_h) = img.dimensions();
    let x = (bounds.x.max(0.0) as u32).min(img_w.saturating_sub(1));
    let y = (bounds.y.max(0.0) as u32).min(img_h.saturating_sub(1));
    let w = (bounds.width as u32).min(img_w - x);
    let h = (bounds.height as u32).min(img_h - y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(img.crop_imm(x, y, w, h))
}

/// 8x8 grayscale thumbnail, luminance in [0, 1].
fn luminance_thumb(img: &DynamicImage) -> Vec<f64> {
    img.resize_exact(THUMB_SIZE, THUMB_SIZE, FilterType::Triangle)
        .to_luma8()
        .pixels()
        .map(|pixel| pixel.0[0] as f64 / 255.0)
        .collect()
}

/// Global SSIM between two equal-length luminance vectors.
fn ssim(a: &[f64], b: &[f64]) -> f64 {
    const C1: f64 = 0.01 * 0.01;
    const C2: f64 = 0.03 * 0.03;

    let n = a.len().min(b.len()) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let var_a = a.iter().map(|v| (v - mean_a).powi(2)).sum::<f64>() / n;
    let var_b = b.iter().map(|v| (v - mean_b).powi(2)).sum::<f64>() / n;
    let cov = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / n;

    let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * cov + C2);
    let denominator = (mean_a.powi(2) + mean_b.powi(2) + C1) * (var_a + var_b + C2);
    (numerator / denominator).clamp(0.0, 1.0)
}

/// Average-hash agreement: fraction of matching bits in the 64-bit hashes.
fn hash_similarity(a: &[f64], b: &[f64]) -> f64 {
    let hash = |thumb: &[f64]| -> u64 {
        let mean = thumb.iter().sum::<f64>() / thumb.len().max(1) as f64;
        thumb
            .iter()
            .take(64)
            .enumerate()
            .fold(0u64, |acc, (i, &v)| {
                if v > mean {
                    acc | (1 << i)
                } else {
                    acc
                }
            })
    };
    let distance = (hash(a) ^ hash(b)).count_ones() as f64;
    1.0 - distance / 64.0
}
