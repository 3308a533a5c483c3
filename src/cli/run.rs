use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use browser_agent::ScriptedBrowserAgent;
use webrunner_task_executor::{AgentStep, AgentTask, ExecutionPlan};

use crate::app_context::AppContext;
use crate::config::WebRunnerConfig;

/// On-disk plan document: metadata plus the ordered steps.
#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    steps: Vec<AgentStep>,
}

pub async fn execute(
    config: &WebRunnerConfig,
    plan_path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    if !dry_run {
        bail!(
            "no browser driver is wired into this binary; \
             pass --dry-run to execute against the scripted agent"
        );
    }

    let raw = std::fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read plan file {}", plan_path.display()))?;
    let plan_file: PlanFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse plan file {}", plan_path.display()))?;

    let task = AgentTask::new(
        plan_file.name.unwrap_or_else(|| "cli-task".to_string()),
        plan_file.prompt.unwrap_or_default(),
    );
    let mut plan = ExecutionPlan::new(task.id.clone());
    for step in plan_file.steps {
        plan.push_step(step);
    }

    let agent = Arc::new(ScriptedBrowserAgent::new());
    let context = AppContext::new(config.clone(), agent);

    let result = context.task_executor.execute_plan(&task, &plan).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("task:     {}", result.task_id);
    println!("status:   {:?}", result.status);
    println!(
        "steps:    {} total, {} ok, {} failed",
        result.statistics.total_steps,
        result.statistics.successful_steps,
        result.statistics.failed_steps
    );
    println!(
        "retries:  {} (healed {})",
        result.statistics.total_retries, result.statistics.healed_steps
    );
    println!("duration: {}ms", result.duration_ms);
    if let Some(message) = &result.error_message {
        println!("error:    {message}");
    }
    for step in &result.step_results {
        let mark = if step.success { "ok " } else { "ERR" };
        println!(
            "  [{mark}] step {:>2}  {}ms  attempts {}",
            step.step_number,
            step.duration_ms,
            step.retry_attempts + 1
        );
    }
    Ok(())
}
