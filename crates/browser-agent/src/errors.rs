use thiserror::Error;

use webrunner_core_types::ErrorKind;

/// Errors surfaced by a browser agent implementation.
///
/// Variants map onto the shared [`ErrorKind`] taxonomy via [`AgentError::kind`];
/// the message text is still inspected by the keyword classifier, so drivers
/// should keep the original driver wording in `message` fields.
#[derive(Debug, Error, Clone)]
pub enum AgentError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("element not interactable: {selector}: {message}")]
    NotInteractable { selector: String, message: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("page crashed: {message}")]
    PageCrash { message: String },

    #[error("script error: {message}")]
    Script { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("browser session error: {message}")]
    Session { message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Coarse mapping into the shared taxonomy. The keyword classifier may
    /// refine this with message inspection and context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Navigation { .. } => ErrorKind::NavigationTimeout,
            AgentError::ElementNotFound { .. } => ErrorKind::SelectorNotFound,
            AgentError::NotInteractable { .. } => ErrorKind::ElementNotInteractable,
            AgentError::Timeout { .. } => ErrorKind::TimingIssue,
            AgentError::Network { .. } => ErrorKind::NetworkError,
            AgentError::PageCrash { .. } => ErrorKind::PageCrash,
            AgentError::Script { .. } => ErrorKind::JavaScriptError,
            AgentError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            AgentError::Session { .. } => ErrorKind::Transient,
            AgentError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_taxonomy() {
        assert_eq!(
            AgentError::element_not_found("#login").kind(),
            ErrorKind::SelectorNotFound
        );
        assert_eq!(
            AgentError::network("connection reset").kind(),
            ErrorKind::NetworkError
        );
        assert_eq!(AgentError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn messages_keep_driver_wording() {
        let err = AgentError::navigation("https://example.com", "net::ERR_TIMED_OUT");
        assert!(err.to_string().contains("net::ERR_TIMED_OUT"));
    }
}
