use crate::context::RoutingContext;
use crate::provider::ProviderProfile;
use crate::types::{ComplexityLevel, ProviderCapabilities, RequestPriority};

/// Scores a provider for a request; the router picks the highest-scoring
/// unattempted provider. A score of zero means "never use".
pub trait RoutingStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn score(
        &self,
        capabilities: &ProviderCapabilities,
        profile: &ProviderProfile,
        ctx: &RoutingContext,
    ) -> f64;
}

/// Streaming and function-calling requirements are hard filters.
fn capability_gate(capabilities: &ProviderCapabilities, ctx: &RoutingContext) -> bool {
    if ctx.requires_streaming && !capabilities.supports_streaming {
        return false;
    }
    if ctx.requires_function_calling && !capabilities.supports_function_calling {
        return false;
    }
    true
}

/// Scores from per-(provider, task-type) base scores, boosting providers
/// whose context window comfortably fits complex requests.
#[derive(Debug, Default)]
pub struct TaskBasedStrategy;

impl RoutingStrategy for TaskBasedStrategy {
    fn name(&self) -> &str {
        "task_based"
    }

    fn score(
        &self,
        capabilities: &ProviderCapabilities,
        profile: &ProviderProfile,
        ctx: &RoutingContext,
    ) -> f64 {
        if !capability_gate(capabilities, ctx) {
            return 0.0;
        }

        let mut score = profile.task_score(ctx.task_type);

        if ctx.complexity >= ComplexityLevel::High {
            if capabilities.max_context_tokens >= 32_000 {
                score += 0.2;
            }
            if ctx.complexity == ComplexityLevel::Expert {
                score += 0.3 * profile.quality;
            }
        }
        // A window too small for the prompt disqualifies outright.
        if ctx.estimated_tokens > capabilities.max_context_tokens {
            return 0.0;
        }

        score.clamp(0.0, 2.0)
    }
}

/// Weights inverse cost and reliability; cheap or local providers win easy
/// requests, quality models take Expert work and Critical priority.
#[derive(Debug, Default)]
pub struct CostOptimizedStrategy;

impl RoutingStrategy for CostOptimizedStrategy {
    fn name(&self) -> &str {
        "cost_optimized"
    }

    fn score(
        &self,
        capabilities: &ProviderCapabilities,
        profile: &ProviderProfile,
        ctx: &RoutingContext,
    ) -> f64 {
        if !capability_gate(capabilities, ctx) {
            return 0.0;
        }
        if ctx.estimated_tokens > capabilities.max_context_tokens {
            return 0.0;
        }

        let cheapness = 1.0 / (1.0 + profile.cost_per_1k_tokens * 100.0);

        let quality_first = ctx.complexity == ComplexityLevel::Expert
            || ctx.priority == RequestPriority::Critical;
        let mut score = if quality_first {
            0.6 * profile.quality + 0.3 * profile.reliability + 0.1 * cheapness
        } else {
            0.5 * cheapness + 0.4 * profile.reliability + 0.1 * profile.quality
        };

        if !quality_first
            && ctx.complexity == ComplexityLevel::Low
            && (profile.local || profile.cost_per_1k_tokens == 0.0)
        {
            score += 0.3;
        }

        score.clamp(0.0, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, CompletionRequest, TaskType};

    fn ctx(text: &str, streaming: bool) -> RoutingContext {
        RoutingContext::from_request(
            &CompletionRequest::new(vec![ChatMessage::user(text)]),
            streaming,
        )
    }

    #[test]
    fn streaming_gate_zeroes_the_score() {
        let capabilities = ProviderCapabilities {
            supports_streaming: false,
            ..ProviderCapabilities::default()
        };
        let profile = ProviderProfile::default();
        let strategy = TaskBasedStrategy;
        assert_eq!(strategy.score(&capabilities, &profile, &ctx("hi", true)), 0.0);
        assert!(strategy.score(&capabilities, &profile, &ctx("hi", false)) > 0.0);
    }

    #[test]
    fn task_scores_drive_task_based_ranking() {
        let capabilities = ProviderCapabilities::default();
        let planner = ProviderProfile::default().with_task_score(TaskType::Planning, 0.9);
        let generalist = ProviderProfile::default().with_task_score(TaskType::Planning, 0.4);
        let strategy = TaskBasedStrategy;
        let planning_ctx = ctx("plan the steps for checkout", false);
        assert!(
            strategy.score(&capabilities, &planner, &planning_ctx)
                > strategy.score(&capabilities, &generalist, &planning_ctx)
        );
    }

    #[test]
    fn cost_strategy_prefers_local_for_low_complexity() {
        let capabilities = ProviderCapabilities::default();
        let local = ProviderProfile::default().local().with_quality(0.5);
        let premium = ProviderProfile::default()
            .with_cost(0.06)
            .with_quality(0.95);
        let strategy = CostOptimizedStrategy;
        let low_ctx = ctx("hi", false);
        assert!(
            strategy.score(&capabilities, &local, &low_ctx)
                > strategy.score(&capabilities, &premium, &low_ctx)
        );
    }

    #[test]
    fn critical_priority_shifts_to_quality() {
        let capabilities = ProviderCapabilities::default();
        let local = ProviderProfile::default().local().with_quality(0.5);
        let premium = ProviderProfile::default()
            .with_cost(0.06)
            .with_quality(0.95)
            .with_reliability(0.95);
        let strategy = CostOptimizedStrategy;

        let mut request = CompletionRequest::new(vec![ChatMessage::user("ship it")]);
        request.priority = RequestPriority::Critical;
        let critical_ctx = RoutingContext::from_request(&request, false);

        assert!(
            strategy.score(&capabilities, &premium, &critical_ctx)
                > strategy.score(&capabilities, &local, &critical_ctx)
        );
    }

    #[test]
    fn oversized_prompts_disqualify_small_windows() {
        let capabilities = ProviderCapabilities {
            max_context_tokens: 1_000,
            ..ProviderCapabilities::default()
        };
        let profile = ProviderProfile::default();
        let huge = "x".repeat(40_000);
        let big_ctx = ctx(&huge, false);
        assert_eq!(TaskBasedStrategy.score(&capabilities, &profile, &big_ctx), 0.0);
        assert_eq!(
            CostOptimizedStrategy.score(&capabilities, &profile, &big_ctx),
            0.0
        );
    }
}
