use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use webrunner_core_types::{CorrelationId, ElementBounds, ErrorKind, TaskId};

/// A recovery action, in the order the service may attempt them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    WaitAndRetry,
    PageRefresh,
    WaitForStability,
    AlternativeSelector,
    ClearCookies,
    NavigationRetry,
    RestartContext,
    #[serde(rename = "none")]
    NoAction,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::WaitAndRetry => "wait_and_retry",
            RecoveryAction::PageRefresh => "page_refresh",
            RecoveryAction::WaitForStability => "wait_for_stability",
            RecoveryAction::AlternativeSelector => "alternative_selector",
            RecoveryAction::ClearCookies => "clear_cookies",
            RecoveryAction::NavigationRetry => "navigation_retry",
            RecoveryAction::RestartContext => "restart_context",
            RecoveryAction::NoAction => "none",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output: kind, confidence and the default action list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    /// In [0.5, 0.95]; 0.5 means "no better idea than Unknown".
    pub confidence: f64,
    /// Original exception message.
    pub message: String,
    pub suggested_actions: Vec<RecoveryAction>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ErrorClassification {
    /// Recoverable = confident enough and something concrete to try.
    pub fn is_recoverable(&self) -> bool {
        self.confidence >= 0.5
            && self
                .suggested_actions
                .iter()
                .any(|action| *action != RecoveryAction::NoAction)
    }
}

/// Mutable context threaded through a recovery attempt. Healing rewrites
/// `selector` in place so the caller's next retry picks it up.
#[derive(Clone, Debug, Default)]
pub struct RecoveryContext {
    pub task_id: Option<TaskId>,
    pub correlation_id: Option<CorrelationId>,
    /// Tool name the failure came from.
    pub action: Option<String>,
    pub url: Option<String>,
    pub selector: Option<String>,
    pub expected_text: Option<String>,
    pub last_known_bounds: Option<ElementBounds>,
    /// Full-page PNG from the last known good state of this page, used by
    /// visual-similarity healing.
    pub baseline_screenshot: Option<Vec<u8>>,
    /// Set when `AlternativeSelector` found a replacement.
    pub healed_selector: Option<String>,
}

impl RecoveryContext {
    pub fn for_tool(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
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

    pub fn with_task_id(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

/// Outcome of one `recover` call.
#[derive(Clone, Debug)]
pub struct RecoveryResult {
    pub success: bool,
    /// Prefix, in order and without repeats, of the merged action plan.
    pub actions_attempted: Vec<RecoveryAction>,
    pub attempt_number: u32,
    pub duration_ms: u64,
    pub classification: ErrorClassification,
    pub final_error: Option<String>,
    /// "learned" when history reordered the plan, else "default".
    pub strategy_label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_needs_confidence_and_actions() {
        let mut classification = ErrorClassification {
            kind: ErrorKind::NetworkError,
            confidence: 0.9,
            message: "connection reset".into(),
            suggested_actions: vec![RecoveryAction::WaitAndRetry],
            context: BTreeMap::new(),
        };
        assert!(classification.is_recoverable());

        classification.suggested_actions = vec![RecoveryAction::NoAction];
        assert!(!classification.is_recoverable());

        classification.suggested_actions = vec![RecoveryAction::WaitAndRetry];
        classification.confidence = 0.4;
        assert!(!classification.is_recoverable());
    }
}
