//! Shared data model for the WebRunner task execution core.
//!
//! Everything here is plain data: ids, parameter values, tool calls and
//! their results, page snapshots, the error taxonomy, and retry timing.
//! Behavior lives in the crates that consume these types.

mod error_kind;
mod ids;
mod page;
mod params;
mod retry;
mod tool;

pub use error_kind::{ErrorDetail, ErrorKind};
pub use ids::{CorrelationId, PlanId, StepId, TaskId};
pub use page::{ElementBounds, InteractiveElement, LoadState, PageState, Viewport};
pub use params::{ParamMap, ParamValue};
pub use retry::RetryStrategy;
pub use tool::{AttemptRecord, ToolCall, ToolExecutionResult};
