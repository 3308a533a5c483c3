use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::LlmError;
use crate::types::{
    CompletionRequest, CompletionResponse, ProviderCapabilities, StreamChunk, TaskType, TokenUsage,
};

/// Lazy, cancellable sequence of streamed chunks. One chunk per consumer
/// pull; there is no internal buffering beyond the chunk in flight.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, LlmError>>;

/// Abstraction over a concrete LLM backend so multiple vendors can plug
/// into the router.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    async fn stream_complete(&self, request: &CompletionRequest) -> Result<ChunkStream, LlmError>;

    async fn generate_embedding(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Vec<f32>, LlmError> {
        let _ = (text, model);
        Err(LlmError::Unsupported(self.name().to_string()))
    }

    /// Cheap liveness check used during provider filtering.
    async fn is_available(&self) -> bool {
        true
    }

    fn capabilities(&self) -> ProviderCapabilities;

    /// Usage of the last completed request, when the backend reports it.
    fn last_token_usage(&self) -> Option<TokenUsage>;
}

/// Routing metadata the strategies score against. Static per provider;
/// reliability is an operator-maintained figure, not live telemetry.
#[derive(Clone, Debug)]
pub struct ProviderProfile {
    /// Blended cost per 1k tokens in USD; zero for local models.
    pub cost_per_1k_tokens: f64,
    /// Operator-assessed reliability in [0, 1].
    pub reliability: f64,
    /// Output quality in [0, 1].
    pub quality: f64,
    /// Runs on local hardware (no per-token cost, no egress).
    pub local: bool,
    /// Base score per task type; missing entries fall back to quality.
    pub task_scores: HashMap<TaskType, f64>,
}

impl Default for ProviderProfile {
    fn default() -> Self {
        Self {
            cost_per_1k_tokens: 0.01,
            reliability: 0.9,
            quality: 0.7,
            local: false,
            task_scores: HashMap::new(),
        }
    }
}

impl ProviderProfile {
    pub fn with_cost(mut self, cost_per_1k_tokens: f64) -> Self {
        self.cost_per_1k_tokens = cost_per_1k_tokens;
        self
    }

    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = quality;
        self
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self.cost_per_1k_tokens = 0.0;
        self
    }

    pub fn with_task_score(mut self, task: TaskType, score: f64) -> Self {
        self.task_scores.insert(task, score);
        self
    }

    pub fn task_score(&self, task: TaskType) -> f64 {
        self.task_scores.get(&task).copied().unwrap_or(self.quality)
    }
}
