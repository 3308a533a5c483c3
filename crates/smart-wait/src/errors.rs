use thiserror::Error;

use browser_agent::AgentError;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("stability wait timed out after {waited_ms}ms ({unmet:?} unmet)")]
    Timeout { waited_ms: u64, unmet: Vec<String> },

    #[error("page probe failed: {0}")]
    Probe(#[from] AgentError),

    #[error("wait cancelled")]
    Cancelled,
}
