//! Task executor: drives an execution plan against the browser tool stack
//! with pause/resume/cancel semantics and per-task statistics.
//!
//! One task id has at most one active plan execution; per-task mutable
//! state (status, pause flag, cancellation token) is owned here for the
//! lifetime of the `execute_plan` call and released on every exit path.

mod convert;
mod errors;
mod executor;
mod model;
mod state;

use serde::{Deserialize, Serialize};

pub use convert::step_to_tool_call;
pub use errors::TaskError;
pub use executor::TaskExecutor;
pub use model::{
    ActionType, AgentStep, AgentStepResult, AgentTask, AgentTaskResult, ExecutionPlan, StepAction,
    TaskStatistics, TaskStatus, ValidationOutcome, ValidationRule,
};

/// Task executor configuration. All knobs have defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskExecutorConfig {
    /// Cancellation check granularity while paused.
    pub pause_poll_interval_ms: u64,
    /// Outer bound for a step that declares no timeout of its own.
    pub default_step_timeout_ms: u64,
    /// Capture a final screenshot when a run ends (best-effort).
    pub final_screenshot: bool,
}

impl Default for TaskExecutorConfig {
    fn default() -> Self {
        Self {
            pause_poll_interval_ms: 100,
            default_step_timeout_ms: 30_000,
            final_screenshot: true,
        }
    }
}
