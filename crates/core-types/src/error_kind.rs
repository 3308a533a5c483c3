use std::fmt;

use serde::{Deserialize, Serialize};

/// Error taxonomy shared by the tool executor, the classifier and the
/// recovery service. Kinds, not concrete exception types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Short-lived fault (network blip, temporary rate limit).
    Transient,
    SelectorNotFound,
    NavigationTimeout,
    TimingIssue,
    ElementNotInteractable,
    NetworkError,
    PageCrash,
    JavaScriptError,
    PermissionDenied,
    /// Tool name not registered.
    UnknownTool,
    /// Schema validation failed; never retried.
    InvalidParameters,
    /// Cancellation is a first-class non-error outcome, never downgraded.
    Cancelled,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::SelectorNotFound => "selector_not_found",
            ErrorKind::NavigationTimeout => "navigation_timeout",
            ErrorKind::TimingIssue => "timing_issue",
            ErrorKind::ElementNotInteractable => "element_not_interactable",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::PageCrash => "page_crash",
            ErrorKind::JavaScriptError => "javascript_error",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::InvalidParameters => "invalid_parameters",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Whether a plain retry with no intervention may succeed.
    ///
    /// Conditional kinds (`SelectorNotFound`, `ElementNotInteractable`) are
    /// not listed here; the tool executor decides those per tool.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Transient
                | ErrorKind::NetworkError
                | ErrorKind::TimingIssue
                | ErrorKind::NavigationTimeout
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidParameters | ErrorKind::UnknownTool | ErrorKind::Cancelled
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error kind plus the human-readable message it surfaced with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_match_taxonomy() {
        assert!(ErrorKind::Transient.is_transient());
        assert!(ErrorKind::NetworkError.is_transient());
        assert!(ErrorKind::NavigationTimeout.is_transient());
        assert!(!ErrorKind::SelectorNotFound.is_transient());
        assert!(!ErrorKind::PageCrash.is_transient());
        assert!(!ErrorKind::Cancelled.is_transient());
    }

    #[test]
    fn terminal_kinds_never_retry() {
        assert!(ErrorKind::InvalidParameters.is_terminal());
        assert!(ErrorKind::Cancelled.is_terminal());
        assert!(!ErrorKind::Transient.is_terminal());
    }
}
