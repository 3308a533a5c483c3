use thiserror::Error;

use webrunner_core_types::ErrorKind;

/// Validation errors produced by the registry. Both are terminal: the tool
/// executor never retries them.
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid parameters for {tool}: missing {missing:?}, wrong type {wrong_type:?}")]
    InvalidParameters {
        tool: String,
        missing: Vec<String>,
        wrong_type: Vec<String>,
    },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::UnknownTool(_) => ErrorKind::UnknownTool,
            RegistryError::InvalidParameters { .. } => ErrorKind::InvalidParameters,
        }
    }
}
