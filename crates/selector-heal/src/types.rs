use std::fmt;

use serde::{Deserialize, Serialize};

use webrunner_core_types::ElementBounds;

/// Strategy that produced a healed selector.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingStrategy {
    TextContent,
    AriaLabel,
    FuzzyAttributes,
    Position,
    VisualSimilarity,
    /// Multiple strategies agreed on the same selector.
    Composite,
    /// Proposed by an LLM; reserved for hosts that wire a model in.
    LlmGenerated,
}

impl HealingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealingStrategy::TextContent => "text_content",
            HealingStrategy::AriaLabel => "aria_label",
            HealingStrategy::FuzzyAttributes => "fuzzy_attributes",
            HealingStrategy::Position => "position",
            HealingStrategy::VisualSimilarity => "visual_similarity",
            HealingStrategy::Composite => "composite",
            HealingStrategy::LlmGenerated => "llm_generated",
        }
    }
}

impl fmt::Display for HealingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored replacement candidate for a failing selector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealedSelector {
    pub selector: String,
    pub strategy: HealingStrategy,
    /// Confidence in [0, 1]; the engine only returns candidates above its
    /// configured threshold.
    pub confidence: f64,
    pub reasoning: String,
}

/// Everything known about the failing selector at heal time.
#[derive(Clone, Debug, Default)]
pub struct HealingContext {
    pub original_selector: String,
    pub page_url: String,
    /// Text the original element was expected to carry, when known.
    pub expected_text: Option<String>,
    /// Last known bounding box of the original element.
    pub last_known_bounds: Option<ElementBounds>,
    /// PNG crop of the original element from a previous run.
    pub baseline_screenshot: Option<Vec<u8>>,
    /// Current full-page PNG.
    pub current_screenshot: Option<Vec<u8>>,
}

impl HealingContext {
    pub fn new(original_selector: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            original_selector: original_selector.into(),
            page_url: page_url.into(),
            ..Self::default()
        }
    }

    pub fn with_expected_text(mut self, text: impl Into<String>) -> Self {
        self.expected_text = Some(text.into());
        self
    }

    pub fn with_last_known_bounds(mut self, bounds: ElementBounds) -> Self {
        self.last_known_bounds = Some(bounds);
        self
    }

    pub fn with_baseline_screenshot(mut self, png: Vec<u8>) -> Self {
        self.baseline_screenshot = Some(png);
        self
    }

    pub fn with_current_screenshot(mut self, png: Vec<u8>) -> Self {
        self.current_screenshot = Some(png);
        self
    }
}
