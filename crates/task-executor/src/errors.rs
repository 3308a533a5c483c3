use thiserror::Error;

use webrunner_core_types::TaskId;

use crate::model::TaskStatus;

#[derive(Debug, Error)]
pub enum TaskError {
    /// A task id may have at most one active plan execution.
    #[error("task {0} is already executing")]
    TaskAlreadyExecuting(TaskId),

    #[error("task {0} is not registered")]
    UnknownTask(TaskId),

    #[error("cannot {operation} task {task_id} while {state:?}")]
    InvalidTransition {
        task_id: TaskId,
        operation: &'static str,
        state: TaskStatus,
    },

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("step {step_number} cannot be converted to a tool call: {reason}")]
    StepConversion { step_number: u32, reason: String },
}
