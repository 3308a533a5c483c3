use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::context::RoutingContext;
use crate::errors::LlmError;
use crate::provider::{ChunkStream, LlmProvider, ProviderProfile};
use crate::strategies::{CostOptimizedStrategy, RoutingStrategy, TaskBasedStrategy};
use crate::types::{CompletionRequest, CompletionResponse};

/// Which built-in strategy the router uses.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    TaskBased,
    CostOptimized,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub enable_fallback: bool,
    pub request_timeout_s: u64,
    /// Upper bound on providers tried for one request.
    pub max_retries: u32,
    pub strategy: StrategyKind,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enable_fallback: true,
            request_timeout_s: 60,
            max_retries: 3,
            strategy: StrategyKind::TaskBased,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

struct ProviderEntry {
    provider: Arc<dyn LlmProvider>,
    profile: ProviderProfile,
}

/// Composes N concrete providers behind one [`LlmProvider`]-shaped surface.
///
/// Selection per request: filter to providers whose breaker admits requests
/// and whose capabilities satisfy the request, rank with the strategy, try
/// the best, cascade on failure while fallback is enabled. An Open breaker
/// is not an error; the provider is simply unavailable this round.
pub struct RoutingProvider {
    entries: Vec<ProviderEntry>,
    strategy: Box<dyn RoutingStrategy>,
    breakers: BreakerRegistry,
    config: RoutingConfig,
}

impl RoutingProvider {
    pub fn new(config: RoutingConfig) -> Self {
        let strategy: Box<dyn RoutingStrategy> = match config.strategy {
            StrategyKind::TaskBased => Box::new(TaskBasedStrategy),
            StrategyKind::CostOptimized => Box::new(CostOptimizedStrategy),
        };
        Self {
            entries: Vec::new(),
            strategy,
            breakers: BreakerRegistry::new(config.circuit_breaker),
            config,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>, profile: ProviderProfile) {
        debug!(
            target: "llm_router",
            provider = provider.name(),
            "registering provider"
        );
        self.entries.push(ProviderEntry { provider, profile });
    }

    pub fn with_provider(
        mut self,
        provider: Arc<dyn LlmProvider>,
        profile: ProviderProfile,
    ) -> Self {
        self.register(provider, profile);
        self
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.provider.name())
            .collect()
    }

    /// Complete a request, cascading across providers on failure.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        ct: &CancellationToken,
    ) -> Result<CompletionResponse, LlmError> {
        let ctx = RoutingContext::from_request(request, false);
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<LlmError> = None;

        loop {
            let Some(entry) = self.select(&ctx, &attempted).await else {
                break;
            };
            let name = entry.provider.name().to_string();
            let breaker = self.breakers.for_provider(&name);

            debug!(
                target: "llm_router",
                provider = %name,
                task = ?ctx.task_type,
                complexity = ?ctx.complexity,
                "dispatching completion"
            );

            match self.run_with_timeout(entry, request, ct).await {
                Ok(response) => {
                    breaker.record_success();
                    info!(
                        target: "llm_router",
                        provider = %name,
                        "completion succeeded"
                    );
                    return Ok(response);
                }
                Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
                Err(error) => {
                    warn!(
                        target: "llm_router",
                        provider = %name,
                        error = %error,
                        "provider failed"
                    );
                    breaker.record_failure(error.kind_label());
                    attempted.push(name);
                    if !self.config.enable_fallback {
                        return Err(error);
                    }
                    last_error = Some(error);
                    if attempted.len() >= self.config.max_retries as usize {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(error) => Err(LlmError::AllProvidersFailed {
                attempted,
                last_error: error.to_string(),
            }),
            None => Err(LlmError::NoProviderAvailable),
        }
    }

    /// Streaming completion. Provider selection is identical to `complete`;
    /// once the stream starts there is no fallback, and cancellation simply
    /// ends the sequence.
    pub async fn stream_complete(
        &self,
        request: &CompletionRequest,
        ct: &CancellationToken,
    ) -> Result<ChunkStream, LlmError> {
        let ctx = RoutingContext::from_request(request, true);
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<LlmError> = None;

        loop {
            let Some(entry) = self.select(&ctx, &attempted).await else {
                break;
            };
            let name = entry.provider.name().to_string();
            let breaker = self.breakers.for_provider(&name);

            match entry.provider.stream_complete(request).await {
                Ok(stream) => {
                    breaker.record_success();
                    let guarded = stream.take_until(ct.clone().cancelled_owned());
                    return Ok(guarded.boxed());
                }
                Err(error) => {
                    breaker.record_failure(error.kind_label());
                    attempted.push(name);
                    if !self.config.enable_fallback {
                        return Err(error);
                    }
                    last_error = Some(error);
                    if attempted.len() >= self.config.max_retries as usize {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(error) => Err(LlmError::AllProvidersFailed {
                attempted,
                last_error: error.to_string(),
            }),
            None => Err(LlmError::NoProviderAvailable),
        }
    }

    /// Embeddings route to the first admissible provider that supports them.
    pub async fn generate_embedding(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Vec<f32>, LlmError> {
        for entry in &self.entries {
            if !entry.provider.capabilities().supports_embeddings {
                continue;
            }
            let breaker = self.breakers.for_provider(entry.provider.name());
            if !breaker.is_request_allowed() {
                continue;
            }
            match entry.provider.generate_embedding(text, model).await {
                Ok(vector) => {
                    breaker.record_success();
                    return Ok(vector);
                }
                Err(error) => {
                    breaker.record_failure(error.kind_label());
                    if !self.config.enable_fallback {
                        return Err(error);
                    }
                }
            }
        }
        Err(LlmError::NoProviderAvailable)
    }

    /// Highest-scoring unattempted provider that passes breaker, liveness
    /// and capability checks.
    async fn select(
        &self,
        ctx: &RoutingContext,
        attempted: &[String],
    ) -> Option<&ProviderEntry> {
        let mut best: Option<(&ProviderEntry, f64)> = None;
        for entry in &self.entries {
            let name = entry.provider.name();
            if attempted.iter().any(|tried| tried == name) {
                continue;
            }
            if !self.breakers.for_provider(name).is_request_allowed() {
                debug!(target: "llm_router", provider = %name, "breaker open; skipping");
                continue;
            }
            if !entry.provider.is_available().await {
                continue;
            }
            let score = self
                .strategy
                .score(&entry.provider.capabilities(), &entry.profile, ctx);
            if score <= 0.0 {
                continue;
            }
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((entry, score)),
            }
        }
        best.map(|(entry, _)| entry)
    }

    async fn run_with_timeout(
        &self,
        entry: &ProviderEntry,
        request: &CompletionRequest,
        ct: &CancellationToken,
    ) -> Result<CompletionResponse, LlmError> {
        let per_request = Duration::from_secs(self.config.request_timeout_s);
        tokio::select! {
            outcome = timeout(per_request, entry.provider.complete(request)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout {
                    provider: entry.provider.name().to_string(),
                    timeout_s: self.config.request_timeout_s,
                }),
            },
            _ = ct.cancelled() => Err(LlmError::Cancelled),
        }
    }
}
