use std::collections::HashSet;

use webrunner_core_types::{InteractiveElement, PageState};

use crate::types::{HealedSelector, HealingContext, HealingStrategy};

use super::HealingRule;

/// Tokens parsed from a CSS-ish selector: tag, `#id`, `.class`, `[attr=value]`.
#[derive(Debug, Default, PartialEq)]
struct SelectorTokens {
    tag: Option<String>,
    id: Option<String>,
    classes: HashSet<String>,
    attrs: Vec<(String, String)>,
}

fn parse_selector(selector: &str) -> SelectorTokens {
    let mut tokens = SelectorTokens::default();
    // Only the last compound selector matters for matching the element itself.
    let compound = selector
        .rsplit(|ch: char| ch.is_whitespace() || ch == '>')
        .next()
        .unwrap_or(selector);

    let mut rest = compound;
    while let Some(start) = rest.find('[') {
        let head = &rest[..start];
        if let Some(end) = rest[start..].find(']') {
            let body = &rest[start + 1..start + end];
            if let Some((name, value)) = body.split_once('=') {
                tokens.attrs.push((
                    name.trim().to_string(),
                    value.trim().trim_matches(['"', '\''].as_slice()).to_string(),
                ));
            }
            rest = &rest[start + end + 1..];
            parse_simple(head, &mut tokens);
        } else {
            parse_simple(head, &mut tokens);
            rest = "";
        }
    }
    parse_simple(rest, &mut tokens);
    tokens
}

fn parse_simple(fragment: &str, tokens: &mut SelectorTokens) {
    let mut current = String::new();
    let mut mode = ' ';
    for ch in fragment.chars().chain(std::iter::once('\0')) {
        if ch == '#' || ch == '.' || ch == '\0' || ch == ':' {
            match mode {
                '#' if !current.is_empty() => tokens.id = Some(current.clone()),
                '.' if !current.is_empty() => {
                    tokens.classes.insert(current.clone());
                }
                ' ' if !current.is_empty() => tokens.tag = Some(current.to_lowercase()),
                _ => {}
            }
            current.clear();
            mode = if ch == ':' { ':' } else { ch };
        } else if mode != ':' {
            current.push(ch);
        }
    }
}

fn element_classes(element: &InteractiveElement) -> HashSet<String> {
    element
        .attribute("class")
        .map(|raw| raw.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Similarity in [0, 1] between the failing selector's tokens and an element.
fn similarity(tokens: &SelectorTokens, element: &InteractiveElement) -> f64 {
    let mut score = 0.0;
    let mut weight = 0.0;

    if let Some(tag) = &tokens.tag {
        weight += 0.2;
        if element.tag.eq_ignore_ascii_case(tag) {
            score += 0.2;
        }
    }

    if let Some(id) = &tokens.id {
        weight += 0.4;
        if element.attribute("id") == Some(id.as_str()) {
            score += 0.4;
        } else if element
            .attribute("id")
            .map(|actual| actual.contains(id.as_str()) || id.contains(actual))
            .unwrap_or(false)
        {
            score += 0.25;
        }
    }

    if !tokens.classes.is_empty() {
        weight += 0.3;
        let classes = element_classes(element);
        let shared = tokens.classes.intersection(&classes).count();
        let union = tokens.classes.union(&classes).count();
        if union > 0 {
            score += 0.3 * shared as f64 / union as f64;
        }
    }

    if !tokens.attrs.is_empty() {
        weight += 0.3;
        let matched = tokens
            .attrs
            .iter()
            .filter(|(name, value)| element.attribute(name) == Some(value.as_str()))
            .count();
        score += 0.3 * matched as f64 / tokens.attrs.len() as f64;
    }

    if weight == 0.0 {
        return 0.0;
    }
    score / weight
}

/// Score elements by token overlap with the failing selector.
pub(crate) struct FuzzyAttributeRule;

impl HealingRule for FuzzyAttributeRule {
    fn strategy(&self) -> HealingStrategy {
        HealingStrategy::FuzzyAttributes
    }

    fn candidates(&self, ctx: &HealingContext, state: &PageState) -> Vec<HealedSelector> {
        let tokens = parse_selector(&ctx.original_selector);
        let mut candidates: Vec<HealedSelector> = state
            .elements
            .iter()
            .filter(|element| element.selector != ctx.original_selector)
            .filter_map(|element| {
                let sim = similarity(&tokens, element);
                if sim < 0.4 {
                    return None;
                }
                Some(HealedSelector {
                    selector: element.selector.clone(),
                    strategy: HealingStrategy::FuzzyAttributes,
                    confidence: (0.5 + 0.45 * sim).min(0.9),
                    reasoning: format!(
                        "<{}> shares {:.0}% of the failing selector's tokens",
                        element.tag,
                        sim * 100.0
                    ),
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }
}
