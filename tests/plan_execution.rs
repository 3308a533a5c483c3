//! End-to-end plan execution scenarios against the scripted browser agent.

use std::sync::Arc;
use std::time::Duration;

use browser_agent::{AgentError, ScriptedBrowserAgent, ScriptedOutcome};
use webrunner_cli::app_context::AppContext;
use webrunner_cli::config::WebRunnerConfig;
use webrunner_core_types::RetryStrategy;
use webrunner_task_executor::{
    AgentStep, AgentTask, ExecutionPlan, StepAction, TaskStatus,
};

/// Defaults shrunk so retries and recovery rounds finish in milliseconds.
fn fast_config() -> WebRunnerConfig {
    let mut config = WebRunnerConfig::default();
    config.tool_executor.base_backoff_ms = 5;
    config.tool_executor.max_backoff_ms = 20;
    config.tool_executor.jitter_factor = 0.0;
    config.recovery.strategy = RetryStrategy {
        max_retries: 2,
        base_delay_ms: 5,
        max_delay_ms: 10,
        jitter_factor: 0.0,
    };
    config.smart_wait.poll_interval_ms = 5;
    config
}

fn context_with(agent: Arc<ScriptedBrowserAgent>) -> AppContext {
    AppContext::new(fast_config(), agent)
}

fn heading_plan(task: &AgentTask) -> ExecutionPlan {
    ExecutionPlan::new(task.id.clone())
        .with_step(AgentStep::new(1, StepAction::navigate("https://example.com")))
        .with_step(AgentStep::new(2, StepAction::wait_for_element("h1", 1_000)))
        .with_step(AgentStep::new(3, StepAction::extract_text("h1")))
}

/// Five slow steps so pause/cancel can strike mid-plan.
fn slow_plan(task: &AgentTask, agent: &ScriptedBrowserAgent, delay_ms: u64) -> ExecutionPlan {
    let mut plan = ExecutionPlan::new(task.id.clone());
    for number in 1..=5 {
        agent.script(
            "verify_element_exists",
            ScriptedOutcome::Delay { ms: delay_ms },
        );
        plan.push_step(AgentStep::new(
            number,
            StepAction::verify(format!("#step-{number}")),
        ));
    }
    plan
}

#[tokio::test]
async fn s1_happy_path() {
    let agent = Arc::new(ScriptedBrowserAgent::new());
    agent.set_text("h1", "Example Domain");
    let context = context_with(agent);
    let task = AgentTask::new("happy", "read the example heading");
    let plan = heading_plan(&task);

    let result = context.task_executor.execute_plan(&task, &plan).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.step_results.len(), 3);
    assert!(result.step_results.iter().all(|step| step.success));
    assert_eq!(result.statistics.total_steps, 3);
    assert_eq!(result.statistics.successful_steps, 3);
    assert_eq!(result.statistics.failed_steps, 0);
    assert_eq!(
        result.step_results[2].data.get("text").unwrap(),
        "Example Domain"
    );
}

#[tokio::test]
async fn s2_transient_failure_is_retried_once() {
    let agent = Arc::new(ScriptedBrowserAgent::new());
    agent.fail_times("navigate", 1, AgentError::network("network unreachable"));
    agent.set_text("h1", "Example Domain");
    let context = context_with(agent);
    let task = AgentTask::new("retry", "survive one network blip");
    let plan = heading_plan(&task);

    let result = context.task_executor.execute_plan(&task, &plan).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, TaskStatus::Completed);
    let navigate = &result.step_results[0];
    assert!(navigate.success);
    assert_eq!(navigate.retry_attempts, 1);
    assert_eq!(result.statistics.retried_steps, 1);
}

#[tokio::test]
async fn s3_pause_and_resume_keeps_step_order() {
    let agent = Arc::new(ScriptedBrowserAgent::new());
    let context = Arc::new(context_with(agent.clone()));
    let task = AgentTask::new("paused", "pause mid-plan");
    let plan = slow_plan(&task, &agent, 200);

    let run = {
        let context = context.clone();
        let task = task.clone();
        let plan = plan.clone();
        tokio::spawn(async move { context.task_executor.execute_plan(&task, &plan).await })
    };

    // Step 1 finishes ~200ms in; pause while step 2 is in flight.
    tokio::time::sleep(Duration::from_millis(300)).await;
    context.task_executor.pause(&task.id).unwrap();
    assert_eq!(
        context.task_executor.get_state(&task.id),
        Some(TaskStatus::Paused)
    );

    // Step 2 drains; step 3 must not start while paused.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(agent.invocation_count("verify_element_exists"), 2);

    context.task_executor.resume(&task.id).unwrap();
    let result = run.await.unwrap().unwrap();

    assert!(result.success);
    assert_eq!(result.status, TaskStatus::Completed);
    let numbers: Vec<u32> = result
        .step_results
        .iter()
        .map(|step| step.step_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn s4_cancel_while_paused() {
    let agent = Arc::new(ScriptedBrowserAgent::new());
    let context = Arc::new(context_with(agent.clone()));
    let task = AgentTask::new("cancelled", "cancel mid-plan");
    let plan = slow_plan(&task, &agent, 200);

    let run = {
        let context = context.clone();
        let task = task.clone();
        let plan = plan.clone();
        tokio::spawn(async move { context.task_executor.execute_plan(&task, &plan).await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    context.task_executor.pause(&task.id).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    context.task_executor.cancel(&task.id).unwrap();

    let result = run.await.unwrap().unwrap();
    assert!(!result.success);
    assert_eq!(result.status, TaskStatus::Cancelled);
    assert_eq!(result.step_results.len(), 2);
    assert_eq!(result.statistics.total_steps, 2);
    assert_eq!(result.error_message.as_deref(), Some("task cancelled"));
    // Step 3 never started.
    assert_eq!(agent.invocation_count("verify_element_exists"), 2);
}

#[tokio::test]
async fn s5_non_optional_failure_stops_execution() {
    let agent = Arc::new(ScriptedBrowserAgent::new());
    // Enough failures to outlast tool retries and the recovery re-run.
    agent.fail_times(
        "wait_for_element",
        20,
        AgentError::element_not_found("h1"),
    );
    let context = context_with(agent.clone());
    let task = AgentTask::new("failing", "step two cannot succeed");
    let plan = heading_plan(&task);

    let result = context.task_executor.execute_plan(&task, &plan).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.step_results.len(), 2);
    let message = result.error_message.unwrap();
    assert!(message.contains("step 2"));
    assert_eq!(agent.invocation_count("get_text"), 0);

    // Step results stay in ascending step order and never exceed the plan.
    let numbers: Vec<u32> = result
        .step_results
        .iter()
        .map(|step| step.step_number)
        .collect();
    assert_eq!(numbers, vec![1, 2]);
    assert!(result.step_results.len() <= plan.steps.len());
}

#[tokio::test]
async fn s6_optional_failure_is_skipped() {
    let agent = Arc::new(ScriptedBrowserAgent::new());
    agent.fail_times("click", 20, AgentError::element_not_found("#banner"));
    agent.set_text("h1", "Example Domain");
    let context = context_with(agent);
    let task = AgentTask::new("optional", "banner may be absent");
    let plan = ExecutionPlan::new(task.id.clone())
        .with_step(AgentStep::new(1, StepAction::navigate("https://example.com")))
        .with_step(AgentStep::new(2, StepAction::click("#banner")).optional())
        .with_step(AgentStep::new(3, StepAction::extract_text("h1")));

    let result = context.task_executor.execute_plan(&task, &plan).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.step_results.len(), 3);
    assert_eq!(result.statistics.failed_steps, 1);
    assert_eq!(result.statistics.successful_steps, 2);
}

#[tokio::test]
async fn empty_plan_completes_with_zeroed_statistics() {
    let agent = Arc::new(ScriptedBrowserAgent::new());
    let context = context_with(agent);
    let task = AgentTask::new("empty", "nothing to do");
    let plan = ExecutionPlan::new(task.id.clone());

    let result = context.task_executor.execute_plan(&task, &plan).await.unwrap();
    assert!(result.success);
    assert_eq!(result.status, TaskStatus::Completed);
    assert!(result.step_results.is_empty());
    assert_eq!(result.statistics.total_steps, 0);
    assert_eq!(result.statistics.avg_step_duration_ms, 0.0);
}
