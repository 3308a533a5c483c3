use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use browser_agent::{AgentError, BrowserAgent};
use webrunner_core_types::{
    AttemptRecord, ErrorDetail, ErrorKind, ToolCall, ToolExecutionResult,
};
use webrunner_tool_registry::ToolRegistry;

use crate::ToolExecutorConfig;

/// Runs individual tool calls against the browser agent.
pub struct ToolExecutor {
    agent: Arc<dyn BrowserAgent>,
    registry: Arc<ToolRegistry>,
    config: ToolExecutorConfig,
}

impl ToolExecutor {
    pub fn new(
        agent: Arc<dyn BrowserAgent>,
        registry: Arc<ToolRegistry>,
        config: ToolExecutorConfig,
    ) -> Self {
        Self {
            agent,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &ToolExecutorConfig {
        &self.config
    }

    /// Execute one tool call to completion.
    ///
    /// Validation failures are terminal and consume no attempt. Transient
    /// failures are retried with exponential backoff and jitter, up to
    /// `max_attempts`; every sleep is raced against the cancellation token.
    pub async fn execute(&self, call: &ToolCall, ct: &CancellationToken) -> ToolExecutionResult {
        let started_at = Utc::now();
        let overall = Instant::now();

        if let Err(err) = self.registry.validate(call) {
            warn!(
                target: "tool_executor",
                tool = %call.tool,
                correlation_id = %call.correlation_id,
                error = %err,
                "tool call rejected by registry"
            );
            // Terminal, but still counted as one (zero-duration, never
            // dispatched) attempt so attempt_count stays within [1, max].
            let kind = err.kind();
            return failure_result(
                started_at,
                overall,
                vec![AttemptRecord {
                    attempt: 1,
                    duration_ms: 0,
                    error_kind: Some(kind),
                }],
                1,
                ErrorDetail::new(kind, err.to_string()),
            );
        }

        let strategy = self.config.retry_strategy();
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error: Option<ErrorDetail> = None;

        for attempt in 1..=self.config.max_attempts {
            if ct.is_cancelled() {
                if attempts.is_empty() {
                    attempts.push(AttemptRecord {
                        attempt: 1,
                        duration_ms: 0,
                        error_kind: Some(ErrorKind::Cancelled),
                    });
                }
                let attempt_count = attempts.len() as u32;
                return failure_result(
                    started_at,
                    overall,
                    attempts,
                    attempt_count,
                    ErrorDetail::new(ErrorKind::Cancelled, "cancelled before attempt"),
                );
            }

            let attempt_timer = Instant::now();
            let outcome = match timeout(self.config.attempt_timeout(), self.dispatch(call, ct))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(AgentError::timeout(
                    call.tool.clone(),
                    self.config.attempt_timeout().as_millis() as u64,
                )),
            };
            let attempt_ms = attempt_timer.elapsed().as_millis() as u64;

            match outcome {
                Ok(value) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        duration_ms: attempt_ms,
                        error_kind: None,
                    });
                    info!(
                        target: "tool_executor",
                        tool = %call.tool,
                        correlation_id = %call.correlation_id,
                        attempts = attempt,
                        run_ms = overall.elapsed().as_millis() as u64,
                        "tool execution completed"
                    );
                    return ToolExecutionResult {
                        success: true,
                        value,
                        error: None,
                        attempt_count: attempt,
                        execution_duration_ms: overall.elapsed().as_millis() as u64,
                        was_retried: attempt > 1,
                        attempts,
                        started_at,
                        completed_at: Utc::now(),
                    };
                }
                Err(error) => {
                    let kind = error.kind();
                    attempts.push(AttemptRecord {
                        attempt,
                        duration_ms: attempt_ms,
                        error_kind: Some(kind),
                    });
                    let detail = ErrorDetail::new(kind, error.to_string());

                    if kind == ErrorKind::Cancelled {
                        return failure_result(started_at, overall, attempts, attempt, detail);
                    }

                    let retryable =
                        retryable_for(&call.tool, kind) && attempt < self.config.max_attempts;
                    warn!(
                        target: "tool_executor",
                        tool = %call.tool,
                        correlation_id = %call.correlation_id,
                        attempt,
                        kind = %kind,
                        retryable,
                        error = %detail.message,
                        "tool attempt failed"
                    );
                    last_error = Some(detail);
                    if !retryable {
                        break;
                    }

                    let delay = strategy.delay(attempt, rand::random::<f64>());
                    debug!(
                        target: "tool_executor",
                        tool = %call.tool,
                        backoff_ms = delay.as_millis() as u64,
                        "backing off before retry"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ct.cancelled() => {
                            return failure_result(
                                started_at,
                                overall,
                                attempts,
                                attempt,
                                ErrorDetail::new(ErrorKind::Cancelled, "cancelled during backoff"),
                            );
                        }
                    }
                }
            }
        }

        let attempt_count = attempts.len() as u32;
        let error = last_error
            .unwrap_or_else(|| ErrorDetail::new(ErrorKind::Unknown, "no attempt was made"));
        failure_result(started_at, overall, attempts, attempt_count, error)
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
        ct: &CancellationToken,
    ) -> Result<Option<serde_json::Value>, AgentError> {
        match call.tool.as_str() {
            "navigate" => {
                let url = required_str(call, "url")?;
                self.agent.navigate(url, ct).await?;
                Ok(None)
            }
            "click" => {
                let selector = required_str(call, "selector")?;
                self.agent.click(selector, ct).await?;
                Ok(None)
            }
            "type" => {
                let selector = required_str(call, "selector")?;
                let text = required_str(call, "text")?;
                self.agent.type_text(selector, text, ct).await?;
                Ok(None)
            }
            "select_option" => {
                let selector = required_str(call, "selector")?;
                let value = required_str(call, "value")?;
                self.agent.select_option(selector, value, ct).await?;
                Ok(None)
            }
            "wait_for_element" => {
                let selector = required_str(call, "selector")?;
                let timeout_ms = call.param_int("timeout_ms").unwrap_or(10_000) as u64;
                self.agent.wait_for_element(selector, timeout_ms, ct).await?;
                Ok(None)
            }
            "take_screenshot" => {
                let base64 = self.agent.take_screenshot(ct).await?;
                Ok(Some(json!({ "base64": base64 })))
            }
            "get_text" => {
                let selector = required_str(call, "selector")?;
                let text = self.agent.get_text(selector, ct).await?;
                Ok(Some(json!({ "text": text })))
            }
            "verify_element_exists" => {
                let selector = required_str(call, "selector")?;
                let exists = self.agent.verify_element_exists(selector, ct).await?;
                Ok(Some(json!({ "exists": exists })))
            }
            other => Err(AgentError::Session {
                message: format!("tool {other} passed validation but has no dispatch arm"),
            }),
        }
    }
}

fn required_str<'a>(call: &'a ToolCall, name: &str) -> Result<&'a str, AgentError> {
    call.param_str(name).ok_or_else(|| AgentError::Session {
        message: format!("parameter {name} missing after validation"),
    })
}

/// Retry policy per (tool, error kind).
///
/// Click is excluded from plain-transient retry: a network or timing fault
/// leaves it unknown whether the click landed. Selector-level kinds imply
/// the action never happened and are safe to retry on any selector tool.
fn retryable_for(tool: &str, kind: ErrorKind) -> bool {
    match kind {
        ErrorKind::SelectorNotFound | ErrorKind::ElementNotInteractable => matches!(
            tool,
            "click" | "type" | "select_option" | "wait_for_element" | "get_text"
                | "verify_element_exists"
        ),
        _ if kind.is_transient() => tool != "click",
        _ => false,
    }
}

fn failure_result(
    started_at: chrono::DateTime<Utc>,
    overall: Instant,
    attempts: Vec<AttemptRecord>,
    attempt_count: u32,
    error: ErrorDetail,
) -> ToolExecutionResult {
    ToolExecutionResult {
        success: false,
        value: None,
        error: Some(error),
        attempt_count,
        execution_duration_ms: overall.elapsed().as_millis() as u64,
        was_retried: attempt_count > 1,
        attempts,
        started_at,
        completed_at: Utc::now(),
    }
}
