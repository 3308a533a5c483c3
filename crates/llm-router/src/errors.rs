use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider {provider} returned HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("request to {provider} timed out after {timeout_s}s")]
    Timeout { provider: String, timeout_s: u64 },

    #[error("provider {provider} rejected the request: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("provider {0} does not support this operation")]
    Unsupported(String),

    #[error("no provider is available for this request")]
    NoProviderAvailable,

    #[error("all providers failed (attempted {attempted:?}): {last_error}")]
    AllProvidersFailed {
        attempted: Vec<String>,
        last_error: String,
    },

    #[error("stream failed: {0}")]
    Stream(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("{0}")]
    Provider(String),
}

impl LlmError {
    /// Short label recorded by circuit breakers.
    pub fn kind_label(&self) -> &'static str {
        match self {
            LlmError::Http { .. } => "http",
            LlmError::Timeout { .. } => "timeout",
            LlmError::InvalidResponse { .. } => "invalid_response",
            LlmError::Unsupported(_) => "unsupported",
            LlmError::NoProviderAvailable => "no_provider",
            LlmError::AllProvidersFailed { .. } => "all_failed",
            LlmError::Stream(_) => "stream",
            LlmError::Cancelled => "cancelled",
            LlmError::Provider(_) => "provider",
        }
    }
}
