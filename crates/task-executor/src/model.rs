use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use webrunner_core_types::{ErrorDetail, PlanId, TaskId};

/// Lifecycle of a task. Terminal states are Completed, Failed, Cancelled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planning,
    Executing,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// A natural-language task submitted for execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: TaskId,
    pub name: String,
    pub prompt: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl AgentTask {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            name: name.into(),
            prompt: prompt.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            owner_id: None,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// Browser action families a step can request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    Type,
    Select,
    WaitForElement,
    Screenshot,
    ExtractText,
    Verify,
}

/// The concrete action of a step: action type plus target/value/timeout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepAction {
    pub action_type: ActionType,
    /// URL for Navigate, CSS selector otherwise.
    #[serde(default)]
    pub target: Option<String>,
    /// Text for Type, option value for Select.
    #[serde(default)]
    pub value: Option<String>,
    /// Per-step outer timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl StepAction {
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::Navigate,
            target: Some(url.into()),
            value: None,
            timeout_ms: None,
        }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::Click,
            target: Some(selector.into()),
            value: None,
            timeout_ms: None,
        }
    }

    pub fn type_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::Type,
            target: Some(selector.into()),
            value: Some(text.into()),
            timeout_ms: None,
        }
    }

    pub fn select(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::Select,
            target: Some(selector.into()),
            value: Some(value.into()),
            timeout_ms: None,
        }
    }

    pub fn wait_for_element(selector: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            action_type: ActionType::WaitForElement,
            target: Some(selector.into()),
            value: None,
            timeout_ms: Some(timeout_ms),
        }
    }

    pub fn screenshot() -> Self {
        Self {
            action_type: ActionType::Screenshot,
            target: None,
            value: None,
            timeout_ms: None,
        }
    }

    pub fn extract_text(selector: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::ExtractText,
            target: Some(selector.into()),
            value: None,
            timeout_ms: None,
        }
    }

    pub fn verify(selector: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::Verify,
            target: Some(selector.into()),
            value: None,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Declared post-step validation. Failures are recorded, never fatal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationRule {
    ElementExists { selector: String },
    TextEquals { selector: String, expected: String },
    TextContains { selector: String, expected: String },
    PageTitle { expected: String },
    DataExtracted { key: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub rule: ValidationRule,
    pub passed: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

/// One step of an execution plan.
///
/// `step_number` is unique within a plan and orders execution strictly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentStep {
    pub step_number: u32,
    pub action: StepAction,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
    /// Optional steps log-and-continue on failure.
    #[serde(default)]
    pub optional: bool,
}

impl AgentStep {
    pub fn new(step_number: u32, action: StepAction) -> Self {
        Self {
            step_number,
            action,
            reasoning: None,
            validations: Vec::new(),
            optional: false,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_validation(mut self, rule: ValidationRule) -> Self {
        self.validations.push(rule);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A planner-produced ordered program. Immutable to the executor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: PlanId,
    pub task_id: TaskId,
    pub steps: Vec<AgentStep>,
    #[serde(default)]
    pub estimated_duration_ms: Option<u64>,
    /// Planner confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub alternatives: Vec<ExecutionPlan>,
}

fn default_confidence() -> f64 {
    1.0
}

impl ExecutionPlan {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            id: PlanId::new(),
            task_id,
            steps: Vec::new(),
            estimated_duration_ms: None,
            confidence: 1.0,
            alternatives: Vec::new(),
        }
    }

    pub fn push_step(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    pub fn with_step(mut self, step: AgentStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Step numbers must be unique; execution sorts them ascending.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.step_number) {
                return Err(format!("duplicate step_number {}", step.step_number));
            }
        }
        Ok(())
    }
}

/// Result of one executed step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentStepResult {
    pub step_number: u32,
    pub success: bool,
    /// Extracted data (text, screenshot payloads, verification flags).
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    pub retry_attempts: u32,
    pub healing_applied: bool,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub validations: Vec<ValidationOutcome>,
}

/// Aggregated execution statistics. Well-defined for zero steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total_steps: u32,
    pub successful_steps: u32,
    pub failed_steps: u32,
    pub retried_steps: u32,
    pub healed_steps: u32,
    pub total_retries: u32,
    pub total_wait_ms: u64,
    pub avg_step_duration_ms: f64,
}

impl TaskStatistics {
    pub fn from_results(results: &[AgentStepResult], total_duration_ms: u64) -> Self {
        let total_steps = results.len() as u32;
        let successful_steps = results.iter().filter(|r| r.success).count() as u32;
        let retried_steps = results.iter().filter(|r| r.retry_attempts > 0).count() as u32;
        let healed_steps = results.iter().filter(|r| r.healing_applied).count() as u32;
        let total_retries: u32 = results.iter().map(|r| r.retry_attempts).sum();
        let step_time: u64 = results.iter().map(|r| r.duration_ms).sum();
        let avg_step_duration_ms = if total_steps == 0 {
            0.0
        } else {
            step_time as f64 / total_steps as f64
        };
        Self {
            total_steps,
            successful_steps,
            failed_steps: total_steps - successful_steps,
            retried_steps,
            healed_steps,
            total_retries,
            total_wait_ms: total_duration_ms.saturating_sub(step_time),
            avg_step_duration_ms,
        }
    }
}

/// Final outcome of an `execute_plan` call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentTaskResult {
    pub task_id: TaskId,
    pub success: bool,
    pub status: TaskStatus,
    /// In execution order, ascending step_number.
    pub step_results: Vec<AgentStepResult>,
    pub statistics: TaskStatistics,
    #[serde(default)]
    pub final_screenshot: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(step_number: u32, success: bool, retries: u32, duration_ms: u64) -> AgentStepResult {
        let now = Utc::now();
        AgentStepResult {
            step_number,
            success,
            data: BTreeMap::new(),
            error: None,
            retry_attempts: retries,
            healing_applied: false,
            duration_ms,
            started_at: now,
            completed_at: now,
            screenshot: None,
            validations: Vec::new(),
        }
    }

    #[test]
    fn statistics_for_zero_steps_are_all_zero() {
        let stats = TaskStatistics::from_results(&[], 0);
        assert_eq!(stats, TaskStatistics::default());
    }

    #[test]
    fn statistics_aggregate_counts_and_averages() {
        let results = vec![
            result(1, true, 0, 100),
            result(2, true, 2, 300),
            result(3, false, 1, 200),
        ];
        let stats = TaskStatistics::from_results(&results, 900);
        assert_eq!(stats.total_steps, 3);
        assert_eq!(stats.successful_steps, 2);
        assert_eq!(stats.failed_steps, 1);
        assert_eq!(stats.retried_steps, 2);
        assert_eq!(stats.total_retries, 3);
        assert_eq!(stats.total_wait_ms, 300);
        assert!((stats.avg_step_duration_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn plan_validation_rejects_duplicate_step_numbers() {
        let task = AgentTask::new("t", "do things");
        let plan = ExecutionPlan::new(task.id.clone())
            .with_step(AgentStep::new(1, StepAction::screenshot()))
            .with_step(AgentStep::new(1, StepAction::screenshot()));
        assert!(plan.validate().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Executing.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }
}
