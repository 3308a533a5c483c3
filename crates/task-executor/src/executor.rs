use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use browser_agent::{AgentError, BrowserAgent};
use error_recovery::{ErrorRecoveryService, RecoveryContext};
use tool_executor::ToolExecutor;
use webrunner_core_types::{
    AttemptRecord, CorrelationId, ErrorDetail, ErrorKind, PageState, ParamValue, TaskId, ToolCall,
    ToolExecutionResult,
};

use crate::convert::step_to_tool_call;
use crate::errors::TaskError;
use crate::model::{
    AgentStep, AgentStepResult, AgentTask, AgentTaskResult, ExecutionPlan, TaskStatistics,
    TaskStatus, ValidationOutcome, ValidationRule,
};
use crate::state::{TaskHandle, TaskRegistry};
use crate::TaskExecutorConfig;

enum PauseGate {
    Continue,
    Cancelled,
}

/// Last-known-good page capture, used as the baseline for selector healing
/// (visual similarity needs an earlier screenshot; position matching needs
/// the element's previous bounds).
#[derive(Default)]
struct StepBaseline {
    screenshot: Option<Vec<u8>>,
    page_state: Option<PageState>,
}

/// Drives execution plans step by step.
pub struct TaskExecutor {
    tools: Arc<ToolExecutor>,
    agent: Arc<dyn BrowserAgent>,
    recovery: Option<Arc<ErrorRecoveryService>>,
    registry: TaskRegistry,
    config: TaskExecutorConfig,
}

impl TaskExecutor {
    pub fn new(
        tools: Arc<ToolExecutor>,
        agent: Arc<dyn BrowserAgent>,
        config: TaskExecutorConfig,
    ) -> Self {
        Self {
            tools,
            agent,
            recovery: None,
            registry: TaskRegistry::new(),
            config,
        }
    }

    /// Wire in error recovery; failed non-optional steps get one recovery
    /// pass (and one healed re-execution) before the task fails.
    pub fn with_recovery(mut self, recovery: Arc<ErrorRecoveryService>) -> Self {
        self.recovery = Some(recovery);
        self
    }

    /// Execute a plan to completion, cancellation or failure.
    ///
    /// Fails fast with [`TaskError::TaskAlreadyExecuting`] when the task id
    /// already has a live execution; every other outcome is expressed in
    /// the returned [`AgentTaskResult`].
    pub async fn execute_plan(
        &self,
        task: &AgentTask,
        plan: &ExecutionPlan,
    ) -> Result<AgentTaskResult, TaskError> {
        plan.validate().map_err(TaskError::InvalidPlan)?;
        let handle = self.registry.register(&task.id)?;
        info!(
            target: "task_executor",
            task = %task.id,
            plan = %plan.id,
            steps = plan.steps.len(),
            "executing plan"
        );
        let result = self.run(task, plan, &handle).await;
        // Registered state is released on every exit path.
        self.registry.remove(&task.id);
        info!(
            target: "task_executor",
            task = %task.id,
            status = ?result.status,
            steps = result.step_results.len(),
            duration_ms = result.duration_ms,
            "plan finished"
        );
        Ok(result)
    }

    /// Execute a single step outside a plan run.
    ///
    /// No per-task state is registered, so pause does not apply; the caller
    /// supplies the cancellation token. Recovery and validations behave
    /// exactly as they do inside `execute_plan`.
    pub async fn execute_step(
        &self,
        task: &AgentTask,
        step: &AgentStep,
        ct: &CancellationToken,
    ) -> Result<AgentStepResult, TaskError> {
        let correlation_id = CorrelationId::new();
        let call = step_to_tool_call(step, &task.id, &correlation_id)?;
        let step_timeout = Duration::from_millis(
            step.action
                .timeout_ms
                .unwrap_or(self.config.default_step_timeout_ms),
        );
        let current_url = if call.tool == "navigate" {
            call.param_str("url").map(str::to_string)
        } else {
            None
        };

        let step_started = Utc::now();
        let step_timer = Instant::now();
        let baseline = StepBaseline::default();
        let (exec, healing_applied) = self
            .drive_call(task, step, &call, &current_url, &baseline, step_timeout, ct)
            .await;

        let mut step_result = step_result_from(step, &exec, healing_applied);
        step_result.started_at = step_started;
        step_result.duration_ms = step_timer.elapsed().as_millis() as u64;
        step_result.completed_at = Utc::now();
        step_result.validations = self.run_validations(step, &step_result, ct).await;
        Ok(step_result)
    }

    pub fn pause(&self, task_id: &TaskId) -> Result<(), TaskError> {
        self.registry.pause(task_id)
    }

    pub fn resume(&self, task_id: &TaskId) -> Result<(), TaskError> {
        self.registry.resume(task_id)
    }

    pub fn cancel(&self, task_id: &TaskId) -> Result<(), TaskError> {
        self.registry.cancel(task_id)
    }

    /// Current state of a live execution; `None` once it has finished.
    pub fn get_state(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.registry.state(task_id)
    }

    async fn run(
        &self,
        task: &AgentTask,
        plan: &ExecutionPlan,
        handle: &Arc<TaskHandle>,
    ) -> AgentTaskResult {
        let started_at = Utc::now();
        let timer = Instant::now();
        let ct = handle.cancellation_token().clone();

        let mut ordered: Vec<&AgentStep> = plan.steps.iter().collect();
        ordered.sort_by_key(|step| step.step_number);

        let mut step_results: Vec<AgentStepResult> = Vec::new();
        let mut fatal: Option<String> = None;
        let mut cancelled = false;
        let mut current_url: Option<String> = None;
        let mut baseline = StepBaseline::default();

        for step in ordered {
            match self.wait_while_paused(handle).await {
                PauseGate::Continue => {}
                PauseGate::Cancelled => {
                    cancelled = true;
                    break;
                }
            }

            let correlation_id = CorrelationId::new();
            let call = match step_to_tool_call(step, &task.id, &correlation_id) {
                Ok(call) => call,
                Err(err) => {
                    let result = conversion_failure(step, &err);
                    step_results.push(result);
                    if step.optional {
                        warn!(
                            target: "task_executor",
                            task = %task.id,
                            step = step.step_number,
                            "optional step dropped: {err}"
                        );
                        continue;
                    }
                    fatal = Some(err.to_string());
                    break;
                }
            };
            if call.tool == "navigate" {
                current_url = call.param_str("url").map(str::to_string);
            }

            let step_timeout = Duration::from_millis(
                step.action
                    .timeout_ms
                    .unwrap_or(self.config.default_step_timeout_ms),
            );
            let step_started = Utc::now();
            let step_timer = Instant::now();

            let (exec, healing_applied) = self
                .drive_call(task, step, &call, &current_url, &baseline, step_timeout, &ct)
                .await;

            if exec.error_kind() == Some(ErrorKind::Cancelled) {
                cancelled = true;
                break;
            }

            let mut step_result = step_result_from(step, &exec, healing_applied);
            step_result.started_at = step_started;
            step_result.duration_ms = step_timer.elapsed().as_millis() as u64;
            step_result.completed_at = Utc::now();
            step_result.validations = self.run_validations(step, &step_result, &ct).await;

            let succeeded = step_result.success;
            debug!(
                target: "task_executor",
                task = %task.id,
                step = step.step_number,
                success = succeeded,
                attempts = step_result.retry_attempts + 1,
                "step finished"
            );
            step_results.push(step_result);

            if !succeeded {
                if step.optional {
                    warn!(
                        target: "task_executor",
                        task = %task.id,
                        step = step.step_number,
                        "optional step failed; continuing"
                    );
                    continue;
                }
                let detail = step_results
                    .last()
                    .and_then(|result| result.error.as_ref())
                    .map(|error| error.message.clone())
                    .unwrap_or_else(|| "unknown error".to_string());
                fatal = Some(format!(
                    "step {} ({:?}) failed: {detail}",
                    step.step_number, step.action.action_type
                ));
                break;
            }

            // The page is in a known-good state; refresh the healing
            // baseline so a later drifted selector can be matched against it.
            if self.recovery.is_some() {
                self.refresh_baseline(&mut baseline, &ct).await;
            }
        }

        let status = if cancelled {
            TaskStatus::Cancelled
        } else if fatal.is_some() {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        handle.set_status(status);

        let error_message = match (&status, fatal) {
            (TaskStatus::Cancelled, _) => Some("task cancelled".to_string()),
            (TaskStatus::Failed, Some(message)) => {
                let succeeded = step_results.iter().filter(|result| result.success).count();
                if succeeded > 0 {
                    Some(format!(
                        "{message} (partial success: {succeeded} of {} steps)",
                        plan.steps.len()
                    ))
                } else {
                    Some(message)
                }
            }
            _ => None,
        };

        // Best-effort final capture; failures never change the outcome.
        let final_screenshot = if self.config.final_screenshot && !ct.is_cancelled() {
            self.agent.take_screenshot(&ct).await.ok()
        } else {
            None
        };

        let duration_ms = timer.elapsed().as_millis() as u64;
        AgentTaskResult {
            task_id: task.id.clone(),
            success: status == TaskStatus::Completed,
            status,
            statistics: TaskStatistics::from_results(&step_results, duration_ms),
            step_results,
            final_screenshot,
            error_message,
            duration_ms,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Block while the pause flag is set, re-checking cancellation at the
    /// configured poll granularity.
    async fn wait_while_paused(&self, handle: &Arc<TaskHandle>) -> PauseGate {
        let poll = Duration::from_millis(self.config.pause_poll_interval_ms.max(1));
        loop {
            if handle.is_cancelled() {
                return PauseGate::Cancelled;
            }
            if !handle.is_paused() {
                return PauseGate::Continue;
            }
            let _ = timeout(poll, handle.resume_notified()).await;
        }
    }

    /// Best-effort capture of the current page as the healing baseline.
    /// Failures leave the previous baseline in place.
    async fn refresh_baseline(&self, baseline: &mut StepBaseline, ct: &CancellationToken) {
        if ct.is_cancelled() {
            return;
        }
        if let Ok(png) = self.agent.take_full_page_screenshot_bytes(ct).await {
            baseline.screenshot = Some(png);
        }
        if let Ok(state) = self.agent.get_page_state(ct).await {
            baseline.page_state = Some(state);
        }
    }

    /// Run a call through the tool executor, with one recovery pass (and a
    /// healed re-execution) when a recovery service is wired.
    #[allow(clippy::too_many_arguments)]
    async fn drive_call(
        &self,
        task: &AgentTask,
        step: &AgentStep,
        call: &ToolCall,
        current_url: &Option<String>,
        baseline: &StepBaseline,
        step_timeout: Duration,
        ct: &CancellationToken,
    ) -> (ToolExecutionResult, bool) {
        let mut healing_applied = false;
        let mut exec = self.run_tool(call, step_timeout, ct).await;

        if !exec.success && exec.error_kind() != Some(ErrorKind::Cancelled) {
            if let Some(recovery) = &self.recovery {
                if let Some((recovered, healed)) = self
                    .try_recover(recovery, task, step, call, &exec, current_url, baseline, ct)
                    .await
                {
                    healing_applied = healed.is_some();
                    let mut retry_call = call.clone();
                    if let Some(selector) = healed {
                        retry_call
                            .params
                            .insert("selector".to_string(), ParamValue::String(selector));
                    }
                    if recovered {
                        let retry = self.run_tool(&retry_call, step_timeout, ct).await;
                        exec = merge_executions(exec, retry);
                    }
                }
            }
        }

        (exec, healing_applied)
    }

    async fn run_tool(
        &self,
        call: &ToolCall,
        step_timeout: Duration,
        ct: &CancellationToken,
    ) -> ToolExecutionResult {
        match timeout(step_timeout, self.tools.execute(call, ct)).await {
            Ok(result) => result,
            Err(_) => {
                let now = Utc::now();
                let message = format!(
                    "step timed out after {}ms (outer bound)",
                    step_timeout.as_millis()
                );
                ToolExecutionResult {
                    success: false,
                    value: None,
                    error: Some(ErrorDetail::new(ErrorKind::TimingIssue, message)),
                    attempt_count: 1,
                    execution_duration_ms: step_timeout.as_millis() as u64,
                    was_retried: false,
                    attempts: vec![AttemptRecord {
                        attempt: 1,
                        duration_ms: step_timeout.as_millis() as u64,
                        error_kind: Some(ErrorKind::TimingIssue),
                    }],
                    started_at: now,
                    completed_at: now,
                }
            }
        }
    }

    /// One recovery pass for a failed step. Returns `(recovered, healed
    /// selector)` or `None` when recovery was not applicable.
    #[allow(clippy::too_many_arguments)]
    async fn try_recover(
        &self,
        recovery: &Arc<ErrorRecoveryService>,
        task: &AgentTask,
        step: &AgentStep,
        call: &ToolCall,
        exec: &ToolExecutionResult,
        current_url: &Option<String>,
        baseline: &StepBaseline,
        ct: &CancellationToken,
    ) -> Option<(bool, Option<String>)> {
        let detail = exec.error.clone()?;
        let error = AgentError::Session {
            message: detail.message,
        };

        let mut ctx = RecoveryContext::for_tool(call.tool.clone()).with_task_id(task.id.clone());
        ctx.correlation_id = Some(call.correlation_id.clone());
        ctx.url = current_url.clone();
        ctx.selector = call.param_str("selector").map(str::to_string);
        ctx.expected_text = expected_text_for(step);
        ctx.baseline_screenshot = baseline.screenshot.clone();
        if let (Some(state), Some(selector)) = (&baseline.page_state, ctx.selector.as_deref()) {
            if let Some(element) = state
                .elements
                .iter()
                .find(|element| element.selector == selector)
            {
                ctx.last_known_bounds = Some(element.bounds);
            }
        }

        let outcome = recovery.recover(&error, &mut ctx, ct).await;
        debug!(
            target: "task_executor",
            task = %task.id,
            step = step.step_number,
            recovered = outcome.success,
            actions = ?outcome.actions_attempted,
            "recovery pass finished"
        );
        Some((outcome.success, ctx.healed_selector))
    }

    async fn run_validations(
        &self,
        step: &AgentStep,
        step_result: &AgentStepResult,
        ct: &CancellationToken,
    ) -> Vec<ValidationOutcome> {
        let mut outcomes = Vec::with_capacity(step.validations.len());
        for rule in &step.validations {
            let outcome = match rule {
                ValidationRule::ElementExists { selector } => {
                    match self.agent.verify_element_exists(selector, ct).await {
                        Ok(exists) => ValidationOutcome {
                            rule: rule.clone(),
                            passed: exists,
                            detail: None,
                        },
                        Err(err) => failed_validation(rule, err.to_string()),
                    }
                }
                ValidationRule::TextEquals { selector, expected } => {
                    match self.agent.get_text(selector, ct).await {
                        Ok(actual) => ValidationOutcome {
                            rule: rule.clone(),
                            passed: actual == *expected,
                            detail: Some(actual),
                        },
                        Err(err) => failed_validation(rule, err.to_string()),
                    }
                }
                ValidationRule::TextContains { selector, expected } => {
                    match self.agent.get_text(selector, ct).await {
                        Ok(actual) => ValidationOutcome {
                            rule: rule.clone(),
                            passed: actual.contains(expected.as_str()),
                            detail: Some(actual),
                        },
                        Err(err) => failed_validation(rule, err.to_string()),
                    }
                }
                ValidationRule::PageTitle { expected } => {
                    match self.agent.get_page_state(ct).await {
                        Ok(state) => ValidationOutcome {
                            rule: rule.clone(),
                            passed: state.title == *expected,
                            detail: Some(state.title),
                        },
                        Err(err) => failed_validation(rule, err.to_string()),
                    }
                }
                ValidationRule::DataExtracted { key } => ValidationOutcome {
                    rule: rule.clone(),
                    passed: step_result.data.contains_key(key),
                    detail: None,
                },
            };
            if !outcome.passed {
                warn!(
                    target: "task_executor",
                    step = step.step_number,
                    rule = ?outcome.rule,
                    "validation failed"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn failed_validation(rule: &ValidationRule, detail: String) -> ValidationOutcome {
    ValidationOutcome {
        rule: rule.clone(),
        passed: false,
        detail: Some(detail),
    }
}

/// The expected text hint for healing, mined from the step's validations.
fn expected_text_for(step: &AgentStep) -> Option<String> {
    step.validations.iter().find_map(|rule| match rule {
        ValidationRule::TextEquals { expected, .. }
        | ValidationRule::TextContains { expected, .. } => Some(expected.clone()),
        _ => None,
    })
}

fn conversion_failure(step: &AgentStep, err: &TaskError) -> AgentStepResult {
    let now = Utc::now();
    AgentStepResult {
        step_number: step.step_number,
        success: false,
        data: Default::default(),
        error: Some(ErrorDetail::new(
            ErrorKind::InvalidParameters,
            err.to_string(),
        )),
        retry_attempts: 0,
        healing_applied: false,
        duration_ms: 0,
        started_at: now,
        completed_at: now,
        screenshot: None,
        validations: Vec::new(),
    }
}

fn step_result_from(
    step: &AgentStep,
    exec: &ToolExecutionResult,
    healing_applied: bool,
) -> AgentStepResult {
    let mut data = std::collections::BTreeMap::new();
    let mut screenshot = None;
    if let Some(serde_json::Value::Object(map)) = &exec.value {
        for (key, value) in map {
            if key == "base64" {
                if let Some(encoded) = value.as_str() {
                    screenshot = Some(encoded.to_string());
                }
            }
            data.insert(key.clone(), value.clone());
        }
    }

    AgentStepResult {
        step_number: step.step_number,
        success: exec.success,
        data,
        error: exec.error.clone(),
        retry_attempts: exec.attempt_count.saturating_sub(1),
        healing_applied,
        duration_ms: exec.execution_duration_ms,
        started_at: exec.started_at,
        completed_at: exec.completed_at,
        screenshot,
        validations: Vec::new(),
    }
}

/// Fold a post-recovery re-execution into the original result.
fn merge_executions(
    original: ToolExecutionResult,
    retry: ToolExecutionResult,
) -> ToolExecutionResult {
    let mut attempts = original.attempts;
    attempts.extend(retry.attempts);
    ToolExecutionResult {
        success: retry.success,
        value: retry.value,
        error: retry.error,
        attempt_count: original.attempt_count + retry.attempt_count,
        execution_duration_ms: original.execution_duration_ms + retry.execution_duration_ms,
        was_retried: true,
        attempts,
        started_at: original.started_at,
        completed_at: retry.completed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_agent::ScriptedBrowserAgent;
    use tool_executor::ToolExecutorConfig;
    use webrunner_tool_registry::ToolRegistry;

    use crate::model::{ActionType, StepAction};

    fn executor_for(agent: Arc<ScriptedBrowserAgent>) -> TaskExecutor {
        let tools = Arc::new(ToolExecutor::new(
            agent.clone(),
            Arc::new(ToolRegistry::with_builtin_tools()),
            ToolExecutorConfig {
                max_attempts: 3,
                base_backoff_ms: 5,
                max_backoff_ms: 20,
                jitter_factor: 0.0,
                attempt_timeout_s: 5,
            },
        ));
        TaskExecutor::new(tools, agent, TaskExecutorConfig::default())
    }

    fn three_step_plan(task: &AgentTask) -> ExecutionPlan {
        ExecutionPlan::new(task.id.clone())
            .with_step(AgentStep::new(1, StepAction::navigate("https://example.com")))
            .with_step(AgentStep::new(2, StepAction::wait_for_element("h1", 1_000)))
            .with_step(AgentStep::new(3, StepAction::extract_text("h1")))
    }

    #[tokio::test]
    async fn empty_plan_completes_with_zero_stats() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        let executor = executor_for(agent);
        let task = AgentTask::new("empty", "do nothing");
        let plan = ExecutionPlan::new(task.id.clone());

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        assert!(result.success);
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.step_results.is_empty());
        assert_eq!(result.statistics.total_steps, 0);
        assert_eq!(result.statistics.avg_step_duration_ms, 0.0);
    }

    #[tokio::test]
    async fn happy_path_collects_ordered_results() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        agent.set_text("h1", "Example Domain");
        let executor = executor_for(agent);
        let task = AgentTask::new("happy", "read the heading");
        let plan = three_step_plan(&task);

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        assert!(result.success);
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.step_results.len(), 3);
        let numbers: Vec<u32> = result
            .step_results
            .iter()
            .map(|step| step.step_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(result.statistics.successful_steps, 3);
        assert_eq!(
            result.step_results[2].data.get("text").unwrap(),
            "Example Domain"
        );
        // After the run the task is no longer registered.
        assert!(executor.get_state(&task.id).is_none());
    }

    #[tokio::test]
    async fn out_of_order_steps_execute_ascending() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        let executor = executor_for(agent.clone());
        let task = AgentTask::new("ordering", "order check");
        let plan = ExecutionPlan::new(task.id.clone())
            .with_step(AgentStep::new(3, StepAction::extract_text("h1")))
            .with_step(AgentStep::new(1, StepAction::navigate("https://example.com")))
            .with_step(AgentStep::new(2, StepAction::wait_for_element("h1", 500)));

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        let numbers: Vec<u32> = result
            .step_results
            .iter()
            .map(|step| step.step_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        let journal: Vec<String> = agent
            .journal()
            .iter()
            .map(|entry| entry.operation.clone())
            .collect();
        let first_three: Vec<&str> = journal.iter().take(3).map(String::as_str).collect();
        assert_eq!(first_three, vec!["navigate", "wait_for_element", "get_text"]);
    }

    #[tokio::test]
    async fn transient_failure_retries_and_completes() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        agent.fail_times("navigate", 1, AgentError::network("connection reset"));
        let executor = executor_for(agent);
        let task = AgentTask::new("retry", "retry navigation");
        let plan = three_step_plan(&task);

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        assert!(result.success);
        assert_eq!(result.step_results[0].retry_attempts, 1);
        assert_eq!(result.statistics.retried_steps, 1);
        assert_eq!(result.statistics.total_retries, 1);
    }

    #[tokio::test]
    async fn non_optional_failure_stops_the_plan() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        // Step 2 always fails, even after retries.
        agent.fail_times(
            "wait_for_element",
            10,
            AgentError::element_not_found("h1"),
        );
        let executor = executor_for(agent.clone());
        let task = AgentTask::new("failing", "stop at step 2");
        let plan = three_step_plan(&task);

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.step_results.len(), 2);
        let message = result.error_message.unwrap();
        assert!(message.contains("step 2"));
        assert!(message.contains("partial success"));
        // Step 3 never ran.
        assert_eq!(agent.invocation_count("get_text"), 0);
    }

    #[tokio::test]
    async fn optional_failure_is_skipped() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        agent.fail_times("click", 10, AgentError::element_not_found("#banner"));
        let executor = executor_for(agent);
        let task = AgentTask::new("optional", "skip the banner");
        let plan = ExecutionPlan::new(task.id.clone())
            .with_step(AgentStep::new(1, StepAction::navigate("https://example.com")))
            .with_step(AgentStep::new(2, StepAction::click("#banner")).optional())
            .with_step(AgentStep::new(3, StepAction::extract_text("h1")));

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        assert!(result.success);
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.step_results.len(), 3);
        assert_eq!(result.statistics.failed_steps, 1);
        assert_eq!(result.statistics.successful_steps, 2);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn duplicate_execution_is_rejected() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        agent.script(
            "navigate",
            browser_agent::ScriptedOutcome::Delay { ms: 300 },
        );
        let executor = Arc::new(executor_for(agent));
        let task = AgentTask::new("dup", "long running");
        let plan = ExecutionPlan::new(task.id.clone())
            .with_step(AgentStep::new(1, StepAction::navigate("https://slow.example")));

        let background = {
            let executor = executor.clone();
            let task = task.clone();
            let plan = plan.clone();
            tokio::spawn(async move { executor.execute_plan(&task, &plan).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = executor.execute_plan(&task, &plan).await;
        assert!(matches!(second, Err(TaskError::TaskAlreadyExecuting(_))));

        let first = background.await.unwrap().unwrap();
        assert!(first.success);
    }

    #[tokio::test]
    async fn execute_step_runs_one_step_standalone() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        agent.set_text("h1", "Standalone");
        let executor = executor_for(agent);
        let task = AgentTask::new("single", "one step only");
        let step = AgentStep::new(1, StepAction::extract_text("h1"));

        let result = executor
            .execute_step(&task, &step, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.step_number, 1);
        assert_eq!(result.data.get("text").unwrap(), "Standalone");
        // No task state was registered for a standalone step.
        assert!(executor.get_state(&task.id).is_none());
    }

    #[tokio::test]
    async fn validations_record_without_failing_the_step() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        agent.set_text("h1", "Welcome");
        let executor = executor_for(agent);
        let task = AgentTask::new("validate", "check heading");
        let plan = ExecutionPlan::new(task.id.clone()).with_step(
            AgentStep::new(1, StepAction::extract_text("h1"))
                .with_validation(ValidationRule::TextEquals {
                    selector: "h1".into(),
                    expected: "Welcome".into(),
                })
                .with_validation(ValidationRule::TextContains {
                    selector: "h1".into(),
                    expected: "Goodbye".into(),
                })
                .with_validation(ValidationRule::DataExtracted { key: "text".into() }),
        );

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        assert!(result.success, "validation failures never fail the step");
        let validations = &result.step_results[0].validations;
        assert_eq!(validations.len(), 3);
        assert!(validations[0].passed);
        assert!(!validations[1].passed);
        assert!(validations[2].passed);
    }

    #[tokio::test]
    async fn final_screenshot_is_captured() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        let executor = executor_for(agent);
        let task = AgentTask::new("shot", "screenshot at end");
        let plan = ExecutionPlan::new(task.id.clone())
            .with_step(AgentStep::new(1, StepAction::navigate("https://example.com")));

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        assert!(result.final_screenshot.is_some());
    }

    #[tokio::test]
    async fn conversion_error_fails_the_task() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        let executor = executor_for(agent);
        let task = AgentTask::new("broken", "bad step");
        let plan = ExecutionPlan::new(task.id.clone()).with_step(AgentStep::new(
            1,
            StepAction {
                action_type: ActionType::Click,
                target: None,
                value: None,
                timeout_ms: None,
            },
        ));

        let result = executor.execute_plan(&task, &plan).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(
            result.step_results[0].error.as_ref().unwrap().kind,
            ErrorKind::InvalidParameters
        );
    }
}
