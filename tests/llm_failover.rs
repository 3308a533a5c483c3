//! Routing, circuit breaking and streaming across LLM providers.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use llm_router::providers::MockLlmProvider;
use llm_router::{
    ChatMessage, CircuitBreakerConfig, CircuitState, CompletionRequest, LlmError,
    ProviderProfile, RoutingConfig, RoutingProvider, TaskType,
};

fn request(text: &str) -> CompletionRequest {
    CompletionRequest::new(vec![ChatMessage::user(text)])
}

/// Provider A is preferred by score but fails; threshold 2.
fn failing_then_healthy(
    enable_fallback: bool,
) -> (RoutingProvider, Arc<MockLlmProvider>, Arc<MockLlmProvider>) {
    let a = Arc::new(MockLlmProvider::new("a").always_fail("backend down"));
    let b = Arc::new(MockLlmProvider::new("b").with_response("from b"));
    let config = RoutingConfig {
        enable_fallback,
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 2,
            open_duration_s: 30,
        },
        ..RoutingConfig::default()
    };
    let router = RoutingProvider::new(config)
        .with_provider(
            a.clone(),
            ProviderProfile::default().with_task_score(TaskType::General, 0.9),
        )
        .with_provider(
            b.clone(),
            ProviderProfile::default().with_task_score(TaskType::General, 0.5),
        );
    (router, a, b)
}

#[tokio::test]
async fn s7_breaker_opens_then_fallback_provider_serves() {
    let (router, a, b) = failing_then_healthy(false);
    let ct = CancellationToken::new();

    // Two calls hit A and fail outright (fallback disabled).
    assert!(router.complete(&request("one"), &ct).await.is_err());
    assert!(router.complete(&request("two"), &ct).await.is_err());
    assert_eq!(a.complete_calls(), 2);
    assert_eq!(b.complete_calls(), 0);
    assert_eq!(
        router.breakers().for_provider("a").state(),
        CircuitState::Open
    );

    // Third call observes A's breaker Open and lands on B.
    let response = router.complete(&request("three"), &ct).await.unwrap();
    assert_eq!(response.provider, "b");
    assert_eq!(response.first_text(), Some("from b"));
    assert_eq!(a.complete_calls(), 2);
    assert_eq!(b.complete_calls(), 1);
}

#[tokio::test]
async fn fallback_enabled_cascades_within_one_call() {
    let (router, a, b) = failing_then_healthy(true);
    let ct = CancellationToken::new();

    let response = router.complete(&request("hello"), &ct).await.unwrap();
    assert_eq!(response.provider, "b");
    assert_eq!(a.complete_calls(), 1);
    assert_eq!(b.complete_calls(), 1);
}

#[tokio::test]
async fn exhausted_providers_report_the_attempt_list() {
    let a = Arc::new(MockLlmProvider::new("a").always_fail("down"));
    let b = Arc::new(MockLlmProvider::new("b").always_fail("down too"));
    let router = RoutingProvider::new(RoutingConfig::default())
        .with_provider(a, ProviderProfile::default())
        .with_provider(b, ProviderProfile::default());

    let error = router
        .complete(&request("anyone?"), &CancellationToken::new())
        .await
        .unwrap_err();
    match error {
        LlmError::AllProvidersFailed { attempted, .. } => {
            assert_eq!(attempted.len(), 2);
        }
        other => panic!("expected AllProvidersFailed, got {other}"),
    }
}

#[tokio::test]
async fn streaming_yields_ordered_chunks_and_finishes() {
    let provider =
        Arc::new(MockLlmProvider::new("streamer").with_chunks(vec!["plan", " the", " steps"]));
    let router = RoutingProvider::new(RoutingConfig::default())
        .with_provider(provider, ProviderProfile::default());

    let stream = router
        .stream_complete(&request("plan the steps"), &CancellationToken::new())
        .await
        .unwrap();
    let chunks: Vec<_> = stream.collect().await;

    let text: String = chunks
        .iter()
        .map(|chunk| chunk.as_ref().unwrap().delta.clone())
        .collect();
    assert_eq!(text, "plan the steps");
    assert!(chunks.last().unwrap().as_ref().unwrap().finish_reason.is_some());
}

#[tokio::test]
async fn cancellation_ends_a_stream_cleanly() {
    let provider = Arc::new(
        MockLlmProvider::new("streamer")
            .with_chunks(vec!["a", "b", "c", "d"])
            .with_chunk_delay_ms(40),
    );
    let router = RoutingProvider::new(RoutingConfig::default())
        .with_provider(provider, ProviderProfile::default());
    let ct = CancellationToken::new();

    let mut stream = router.stream_complete(&request("go"), &ct).await.unwrap();
    assert!(stream.next().await.is_some());
    ct.cancel();
    let remaining: Vec<_> = stream.collect().await;
    assert!(remaining.len() < 3);
}

#[tokio::test]
async fn embeddings_route_to_a_capable_provider() {
    let provider = Arc::new(MockLlmProvider::new("embedder"));
    let router = RoutingProvider::new(RoutingConfig::default())
        .with_provider(provider, ProviderProfile::default());

    let vector = router.generate_embedding("hello", None).await.unwrap();
    assert_eq!(vector.len(), 8);
}
