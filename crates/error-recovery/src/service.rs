use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use browser_agent::{AgentError, BrowserAgent};
use selector_heal::{HealingContext, SelectorHealer};
use smart_wait::{SmartWaitService, StabilityOptions};
use webrunner_core_types::RetryStrategy;

use crate::classifier::classify;
use crate::history::{RecoveryHistoryStore, RecoveryOutcome};
use crate::types::{RecoveryAction, RecoveryContext, RecoveryResult};

const WAIT_AND_RETRY_MS: u64 = 2_000;
const STABILITY_FALLBACK_MS: u64 = 3_000;
const STABILITY_MAX_WAIT_MS: u64 = 10_000;

/// Recovery loop configuration; the retry strategy shapes the pacing
/// between action rounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub strategy: RetryStrategy,
    /// How many learned sequences to fold into the plan.
    pub learned_sequences: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::recovery_defaults(),
            learned_sequences: 3,
        }
    }
}

/// Runs recovery actions for classified failures and records the outcomes.
///
/// `recover` never returns an error: action failures are swallowed and the
/// next action is tried; the worst case is a failed [`RecoveryResult`].
pub struct ErrorRecoveryService {
    agent: Arc<dyn BrowserAgent>,
    smart_wait: Option<Arc<SmartWaitService>>,
    healer: Option<Arc<SelectorHealer>>,
    history: Arc<dyn RecoveryHistoryStore>,
    config: RecoveryConfig,
}

impl ErrorRecoveryService {
    pub fn new(
        agent: Arc<dyn BrowserAgent>,
        history: Arc<dyn RecoveryHistoryStore>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            agent,
            smart_wait: None,
            healer: None,
            history,
            config,
        }
    }

    pub fn with_smart_wait(mut self, smart_wait: Arc<SmartWaitService>) -> Self {
        self.smart_wait = Some(smart_wait);
        self
    }

    pub fn with_healer(mut self, healer: Arc<SelectorHealer>) -> Self {
        self.healer = Some(healer);
        self
    }

    /// Attempt to recover from `error`.
    ///
    /// The action plan merges the top historically-successful sequences for
    /// this error kind with the classifier's defaults, learned entries
    /// first, deduplicated in order. Each round sleeps per the retry
    /// strategy and then works through not-yet-attempted actions; the first
    /// action that applies cleanly ends the call.
    pub async fn recover(
        &self,
        error: &AgentError,
        ctx: &mut RecoveryContext,
        ct: &CancellationToken,
    ) -> RecoveryResult {
        let started = Instant::now();
        let classification = classify(error, Some(ctx));

        if !classification.is_recoverable() {
            debug!(
                target: "error_recovery",
                kind = %classification.kind,
                confidence = classification.confidence,
                "error is not recoverable"
            );
            return RecoveryResult {
                success: false,
                actions_attempted: Vec::new(),
                attempt_number: 0,
                duration_ms: started.elapsed().as_millis() as u64,
                final_error: Some(classification.message.clone()),
                strategy_label: "none".to_string(),
                classification,
            };
        }

        let learned = self
            .history
            .top_sequences(classification.kind, self.config.learned_sequences);
        let strategy_label = if learned.is_empty() {
            "default"
        } else {
            "learned"
        };
        let plan = merge_plan(&learned, &classification.suggested_actions);
        debug!(
            target: "error_recovery",
            kind = %classification.kind,
            ?plan,
            strategy = strategy_label,
            "recovery plan assembled"
        );

        let mut attempted: Vec<RecoveryAction> = Vec::new();
        let mut result = RecoveryResult {
            success: false,
            actions_attempted: Vec::new(),
            attempt_number: 0,
            duration_ms: 0,
            classification,
            final_error: None,
            strategy_label: strategy_label.to_string(),
        };

        'rounds: for attempt in 1..=self.config.strategy.max_retries {
            result.attempt_number = attempt;
            let delay = self.config.strategy.delay(attempt, rand::random::<f64>());
            if !sleep_cancellable(delay, ct).await {
                result.final_error = Some("recovery cancelled".to_string());
                break 'rounds;
            }

            let pending: Vec<RecoveryAction> = plan
                .iter()
                .copied()
                .filter(|action| !attempted.contains(action))
                .collect();
            for action in pending {
                if ct.is_cancelled() {
                    result.final_error = Some("recovery cancelled".to_string());
                    break 'rounds;
                }
                attempted.push(action);
                match self.apply_action(action, ctx, ct).await {
                    Ok(true) => {
                        info!(
                            target: "error_recovery",
                            action = %action,
                            attempt,
                            "recovery action applied"
                        );
                        result.success = true;
                        break 'rounds;
                    }
                    Ok(false) => {
                        debug!(target: "error_recovery", action = %action, "action had no effect");
                    }
                    Err(action_error) => {
                        // Action failures never propagate out of recover.
                        warn!(
                            target: "error_recovery",
                            action = %action,
                            error = %action_error,
                            "recovery action failed"
                        );
                        result.final_error = Some(action_error.to_string());
                    }
                }
            }

            if attempted.len() == plan.len() {
                break;
            }
        }

        result.actions_attempted = attempted;
        result.duration_ms = started.elapsed().as_millis() as u64;
        if !result.success && result.final_error.is_none() {
            result.final_error = Some(result.classification.message.clone());
        }

        self.persist(&result, ctx, error);
        result
    }

    async fn apply_action(
        &self,
        action: RecoveryAction,
        ctx: &mut RecoveryContext,
        ct: &CancellationToken,
    ) -> Result<bool, AgentError> {
        match action {
            RecoveryAction::WaitAndRetry => {
                if !sleep_cancellable(Duration::from_millis(WAIT_AND_RETRY_MS), ct).await {
                    return Err(AgentError::Cancelled);
                }
                Ok(true)
            }
            RecoveryAction::PageRefresh => {
                let url = self.current_url(ctx, ct).await?;
                self.agent.navigate(&url, ct).await?;
                Ok(true)
            }
            RecoveryAction::WaitForStability => match &self.smart_wait {
                Some(smart_wait) => {
                    let options = StabilityOptions {
                        max_wait_ms: STABILITY_MAX_WAIT_MS,
                        require_all: true,
                        throw_on_timeout: false,
                    };
                    let metrics = smart_wait
                        .wait_for_stable_state(self.agent.as_ref(), &[], &options, ct)
                        .await
                        .map_err(|err| AgentError::Session {
                            message: err.to_string(),
                        })?;
                    Ok(metrics.is_stable)
                }
                None => {
                    if !sleep_cancellable(Duration::from_millis(STABILITY_FALLBACK_MS), ct).await {
                        return Err(AgentError::Cancelled);
                    }
                    Ok(true)
                }
            },
            RecoveryAction::AlternativeSelector => self.heal_selector(ctx, ct).await,
            RecoveryAction::ClearCookies => {
                let url = self.current_url(ctx, ct).await?;
                self.agent.navigate("about:blank", ct).await?;
                self.agent.navigate(&url, ct).await?;
                Ok(true)
            }
            RecoveryAction::NavigationRetry => match &ctx.url {
                Some(url) => {
                    self.agent.navigate(url, ct).await?;
                    Ok(true)
                }
                None => Ok(false),
            },
            RecoveryAction::RestartContext => {
                self.agent.dispose().await?;
                self.agent.initialize().await?;
                Ok(true)
            }
            RecoveryAction::NoAction => Ok(false),
        }
    }

    /// Heal the failing selector and rewrite the context in place so the
    /// caller's next retry uses the replacement. The stored plan is never
    /// mutated.
    async fn heal_selector(
        &self,
        ctx: &mut RecoveryContext,
        ct: &CancellationToken,
    ) -> Result<bool, AgentError> {
        let Some(healer) = &self.healer else {
            return Ok(false);
        };
        let Some(selector) = ctx.selector.clone() else {
            return Ok(false);
        };

        let state = self.agent.get_page_state(ct).await?;
        let mut healing_ctx = HealingContext::new(selector, state.url.clone());
        if let Some(text) = &ctx.expected_text {
            healing_ctx = healing_ctx.with_expected_text(text.clone());
        }
        if let Some(bounds) = ctx.last_known_bounds {
            healing_ctx = healing_ctx.with_last_known_bounds(bounds);
        }
        if let Some(baseline) = &ctx.baseline_screenshot {
            healing_ctx = healing_ctx.with_baseline_screenshot(baseline.clone());
        }
        // Screenshot capture is best-effort; visual healing degrades to the
        // structural strategies without one.
        if let Ok(png) = self.agent.take_full_page_screenshot_bytes(ct).await {
            healing_ctx = healing_ctx.with_current_screenshot(png);
        }

        match healer.heal(&healing_ctx, &state) {
            Some(healed) => {
                healer.record_outcome(&healing_ctx, &healed, true);
                ctx.healed_selector = Some(healed.selector.clone());
                ctx.selector = Some(healed.selector);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn current_url(
        &self,
        ctx: &RecoveryContext,
        ct: &CancellationToken,
    ) -> Result<String, AgentError> {
        if let Some(url) = &ctx.url {
            return Ok(url.clone());
        }
        Ok(self.agent.get_page_state(ct).await?.url)
    }

    fn persist(&self, result: &RecoveryResult, ctx: &RecoveryContext, error: &AgentError) {
        self.history.append(RecoveryOutcome {
            task_id: ctx.task_id.as_ref().map(|id| id.0.clone()),
            error_kind: result.classification.kind,
            exception_type: exception_type_name(error),
            actions: result.actions_attempted.clone(),
            success: result.success,
            attempts: result.attempt_number,
            duration_ms: result.duration_ms,
            url: ctx.url.clone(),
            action: ctx.action.clone(),
            selector: ctx.selector.clone(),
            context: json!({
                "correlation_id": ctx.correlation_id.as_ref().map(|id| id.0.clone()),
                "expected_text": ctx.expected_text,
                "healed_selector": ctx.healed_selector,
            }),
            timestamp: Utc::now(),
        });
    }
}

/// Variant name recorded in history rows as the exception type.
fn exception_type_name(error: &AgentError) -> String {
    let variant = match error {
        AgentError::Navigation { .. } => "Navigation",
        AgentError::ElementNotFound { .. } => "ElementNotFound",
        AgentError::NotInteractable { .. } => "NotInteractable",
        AgentError::Timeout { .. } => "Timeout",
        AgentError::Network { .. } => "Network",
        AgentError::PageCrash { .. } => "PageCrash",
        AgentError::Script { .. } => "Script",
        AgentError::PermissionDenied { .. } => "PermissionDenied",
        AgentError::Session { .. } => "Session",
        AgentError::Cancelled => "Cancelled",
    };
    format!("AgentError::{variant}")
}

/// Learned sequences first, then classifier defaults, deduplicated in order.
fn merge_plan(
    learned: &[Vec<RecoveryAction>],
    defaults: &[RecoveryAction],
) -> Vec<RecoveryAction> {
    let mut plan = Vec::new();
    for action in learned
        .iter()
        .flatten()
        .chain(defaults.iter())
        .filter(|action| **action != RecoveryAction::NoAction)
    {
        if !plan.contains(action) {
            plan.push(*action);
        }
    }
    plan
}

/// Returns `true` if the sleep completed, `false` on cancellation.
async fn sleep_cancellable(delay: Duration, ct: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = ct.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryRecoveryHistory;
    use browser_agent::ScriptedBrowserAgent;
    use selector_heal::{HealerConfig, InMemoryHealingHistory};
    use webrunner_core_types::{ErrorKind, InteractiveElement, PageState};

    fn fast_config() -> RecoveryConfig {
        RecoveryConfig {
            strategy: RetryStrategy {
                max_retries: 2,
                base_delay_ms: 5,
                max_delay_ms: 10,
                jitter_factor: 0.0,
            },
            learned_sequences: 3,
        }
    }

    fn service(
        agent: Arc<ScriptedBrowserAgent>,
        history: Arc<InMemoryRecoveryHistory>,
    ) -> ErrorRecoveryService {
        ErrorRecoveryService::new(agent, history, fast_config())
    }

    #[tokio::test]
    async fn network_error_recovers_with_wait_and_retry() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        let history = Arc::new(InMemoryRecoveryHistory::new());
        let recovery = service(agent, history.clone());

        let error = AgentError::network("connection reset");
        let mut ctx = RecoveryContext::for_tool("navigate").with_url("https://example.com");

        let result = recovery
            .recover(&error, &mut ctx, &CancellationToken::new())
            .await;

        assert!(result.success);
        assert_eq!(
            result.actions_attempted,
            vec![RecoveryAction::WaitAndRetry]
        );
        assert_eq!(result.strategy_label, "default");
        assert_eq!(history.len(), 1);
        assert!(history.snapshot()[0].success);
    }

    #[tokio::test]
    async fn unrecoverable_error_returns_immediately() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        let history = Arc::new(InMemoryRecoveryHistory::new());
        let recovery = service(agent, history.clone());

        let mut ctx = RecoveryContext::for_tool("click");
        let result = recovery
            .recover(&AgentError::Cancelled, &mut ctx, &CancellationToken::new())
            .await;

        assert!(!result.success);
        assert!(result.actions_attempted.is_empty());
        assert_eq!(result.classification.kind, ErrorKind::Cancelled);
        assert_eq!(history.len(), 0);
    }

    #[tokio::test]
    async fn selector_error_heals_and_rewrites_context() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        agent.set_page_state(
            PageState::new("https://shop.example", "Shop").with_elements(vec![
                InteractiveElement {
                    tag: "button".into(),
                    selector: "button.checkout-now".into(),
                    text: "Checkout".into(),
                    ..InteractiveElement::default()
                },
            ]),
        );
        let history = Arc::new(InMemoryRecoveryHistory::new());
        let healer = Arc::new(SelectorHealer::new(
            Arc::new(InMemoryHealingHistory::new()),
            HealerConfig::default(),
        ));
        let recovery = service(agent, history.clone()).with_healer(healer);

        let error = AgentError::element_not_found("#checkout");
        let mut ctx = RecoveryContext::for_tool("click")
            .with_url("https://shop.example")
            .with_selector("#checkout")
            .with_expected_text("Checkout");

        let result = recovery
            .recover(&error, &mut ctx, &CancellationToken::new())
            .await;

        assert!(result.success);
        assert_eq!(
            result.actions_attempted,
            vec![RecoveryAction::AlternativeSelector]
        );
        assert_eq!(ctx.selector.as_deref(), Some("button.checkout-now"));
        assert_eq!(ctx.healed_selector.as_deref(), Some("button.checkout-now"));
    }

    #[tokio::test]
    async fn visual_similarity_heals_when_structure_gives_nothing() {
        use image::{ImageBuffer, Rgba};
        use webrunner_core_types::ElementBounds;

        fn png_of(width: u32, height: u32, paint: impl Fn(u32, u32) -> Rgba<u8>) -> Vec<u8> {
            let img = ImageBuffer::from_fn(width, height, paint);
            let mut buf = Vec::new();
            image::DynamicImage::ImageRgba8(img)
                .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
                .unwrap();
            buf
        }

        // The dark logo block moved from the top-left corner to mid-page;
        // it carries no text, no aria-label, and shares no selector tokens
        // with the original, so only the visual strategy can match it.
        let baseline_png = png_of(800, 400, |x, y| {
            if x < 100 && y < 40 {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([230, 230, 230, 255])
            }
        });
        let current_png = png_of(800, 400, |x, y| {
            if (600..700).contains(&x) && (300..340).contains(&y) {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([230, 230, 230, 255])
            }
        });

        let agent = Arc::new(ScriptedBrowserAgent::new());
        agent.set_page_state(
            PageState::new("https://brand.example", "Brand").with_elements(vec![
                InteractiveElement {
                    tag: "img".into(),
                    selector: "img.brand-mark".into(),
                    bounds: ElementBounds {
                        x: 600.0,
                        y: 300.0,
                        width: 100.0,
                        height: 40.0,
                    },
                    ..InteractiveElement::default()
                },
            ]),
        );
        agent.set_screenshot_bytes(current_png);

        let history = Arc::new(InMemoryRecoveryHistory::new());
        let healer = Arc::new(SelectorHealer::new(
            Arc::new(InMemoryHealingHistory::new()),
            HealerConfig::default(),
        ));
        let recovery = service(agent, history).with_healer(healer);

        let error = AgentError::element_not_found("#logo");
        let mut ctx = RecoveryContext::for_tool("click")
            .with_url("https://brand.example")
            .with_selector("#logo")
            .with_last_known_bounds(ElementBounds {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 40.0,
            })
            .with_baseline_screenshot(baseline_png);

        let result = recovery
            .recover(&error, &mut ctx, &CancellationToken::new())
            .await;

        assert!(result.success);
        assert_eq!(
            result.actions_attempted,
            vec![RecoveryAction::AlternativeSelector]
        );
        assert_eq!(ctx.selector.as_deref(), Some("img.brand-mark"));
    }

    #[tokio::test]
    async fn actions_attempted_is_a_prefix_without_repeats() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        // No healer wired: AlternativeSelector is a no-op, then stability
        // fallback sleeps, then PageRefresh navigates.
        let history = Arc::new(InMemoryRecoveryHistory::new());
        let recovery = service(agent.clone(), history.clone());

        let error = AgentError::element_not_found("#gone");
        let mut ctx = RecoveryContext::for_tool("click")
            .with_url("https://example.com")
            .with_selector("#gone");

        let result = recovery
            .recover(&error, &mut ctx, &CancellationToken::new())
            .await;

        // Stability fallback (fixed sleep) reports success.
        assert!(result.success);
        assert_eq!(
            result.actions_attempted,
            vec![
                RecoveryAction::AlternativeSelector,
                RecoveryAction::WaitForStability
            ]
        );
        let mut deduped = result.actions_attempted.clone();
        deduped.dedup();
        assert_eq!(deduped, result.actions_attempted);
    }

    #[tokio::test]
    async fn learned_sequences_reorder_the_plan() {
        use RecoveryAction::*;
        let agent = Arc::new(ScriptedBrowserAgent::new());
        let history = Arc::new(InMemoryRecoveryHistory::new());
        // Seed history: PageRefresh worked twice for selector errors.
        for _ in 0..2 {
            history.append(RecoveryOutcome {
                task_id: None,
                error_kind: ErrorKind::SelectorNotFound,
                exception_type: "AgentError::ElementNotFound".into(),
                actions: vec![PageRefresh],
                success: true,
                attempts: 1,
                duration_ms: 5,
                url: None,
                action: None,
                selector: None,
                context: serde_json::Value::Null,
                timestamp: Utc::now(),
            });
        }
        let recovery = service(agent.clone(), history);

        let error = AgentError::element_not_found("#gone");
        let mut ctx = RecoveryContext::for_tool("click")
            .with_url("https://example.com")
            .with_selector("#gone");

        let result = recovery
            .recover(&error, &mut ctx, &CancellationToken::new())
            .await;

        assert!(result.success);
        assert_eq!(result.strategy_label, "learned");
        // The learned PageRefresh ran before the classifier's defaults.
        assert_eq!(result.actions_attempted, vec![PageRefresh]);
        assert_eq!(agent.invocation_count("navigate"), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_the_recovery_loop() {
        let agent = Arc::new(ScriptedBrowserAgent::new());
        let history = Arc::new(InMemoryRecoveryHistory::new());
        let recovery = service(agent, history);

        let ct = CancellationToken::new();
        ct.cancel();
        let error = AgentError::network("connection reset");
        let mut ctx = RecoveryContext::for_tool("navigate").with_url("https://example.com");

        let result = recovery.recover(&error, &mut ctx, &ct).await;
        assert!(!result.success);
        assert!(result.actions_attempted.is_empty());
    }
}
