use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error_kind::{ErrorDetail, ErrorKind};
use crate::ids::{CorrelationId, TaskId};
use crate::params::{ParamMap, ParamValue};

/// One browser tool invocation: name, typed parameters and bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Propagated through logs, metrics and persisted history.
    pub correlation_id: CorrelationId,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: ParamMap::new(),
            reasoning: None,
            task_id: None,
            correlation_id: CorrelationId::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_task_id(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(ParamValue::as_str)
    }

    pub fn param_int(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(ParamValue::as_int)
    }
}

/// Outcome metadata for a single attempt within a tool execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub duration_ms: u64,
    /// Error kind seen by this attempt; `None` on the successful attempt.
    pub error_kind: Option<ErrorKind>,
}

/// Result of running one tool call through the tool executor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub success: bool,
    /// Tool-specific payload (extracted text, screenshot data, ...).
    pub value: Option<serde_json::Value>,
    pub error: Option<ErrorDetail>,
    pub attempt_count: u32,
    pub execution_duration_ms: u64,
    pub was_retried: bool,
    pub attempts: Vec<AttemptRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ToolExecutionResult {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|detail| detail.kind)
    }
}
