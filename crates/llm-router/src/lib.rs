//! LLM routing and resilience.
//!
//! An abstract [`LlmProvider`] fronts any number of backends; the
//! [`RoutingProvider`] scores them per request (task type, cost,
//! capabilities), wraps each in its own circuit breaker, and cascades to
//! the next backend on failure. Streaming yields one chunk per pull and
//! never fails over mid-stream.

mod breaker;
mod context;
mod errors;
mod provider;
pub mod providers;
mod router;
mod strategies;
mod types;

pub use breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use context::RoutingContext;
pub use errors::LlmError;
pub use provider::{ChunkStream, LlmProvider, ProviderProfile};
pub use router::{RoutingConfig, RoutingProvider, StrategyKind};
pub use strategies::{CostOptimizedStrategy, RoutingStrategy, TaskBasedStrategy};
pub use types::{
    ChatMessage, Choice, CompletionRequest, CompletionResponse, ComplexityLevel, FinishReason,
    ProviderCapabilities, RequestPriority, Role, StreamChunk, TaskType, TokenUsage,
};
