use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::LlmError;
use crate::provider::{ChunkStream, LlmProvider};
use crate::types::{
    ChatMessage, Choice, CompletionRequest, CompletionResponse, FinishReason,
    ProviderCapabilities, StreamChunk, TokenUsage,
};

/// Deterministic provider used for tests and offline development.
pub struct MockLlmProvider {
    name: String,
    capabilities: ProviderCapabilities,
    response_text: String,
    failure: Option<String>,
    chunks: Option<Vec<String>>,
    chunk_delay_ms: u64,
    available: AtomicBool,
    complete_calls: AtomicU32,
    stream_calls: AtomicU32,
    last_usage: Mutex<Option<TokenUsage>>,
}

impl MockLlmProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: ProviderCapabilities {
                supports_streaming: true,
                supports_function_calling: true,
                supports_vision: false,
                supports_embeddings: true,
                max_context_tokens: 128_000,
                max_output_tokens: 8_192,
            },
            response_text: "mock response".to_string(),
            failure: None,
            chunks: None,
            chunk_delay_ms: 0,
            available: AtomicBool::new(true),
            complete_calls: AtomicU32::new(0),
            stream_calls: AtomicU32::new(0),
            last_usage: Mutex::new(None),
        }
    }

    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.response_text = text.into();
        self
    }

    /// Every call fails with the given message.
    pub fn always_fail(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<&str>) -> Self {
        self.chunks = Some(chunks.into_iter().map(str::to_string).collect());
        self
    }

    pub fn with_chunk_delay_ms(mut self, delay_ms: u64) -> Self {
        self.chunk_delay_ms = delay_ms;
        self
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn complete_calls(&self) -> u32 {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> u32 {
        self.stream_calls.load(Ordering::SeqCst)
    }

    fn usage_for(&self, request: &CompletionRequest) -> TokenUsage {
        TokenUsage {
            input_tokens: (request.total_chars() / 4) as u64,
            output_tokens: (self.response_text.len() / 4) as u64,
            cost_usd: 0.0,
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let call = self.complete_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(message) = &self.failure {
            return Err(LlmError::Provider(message.clone()));
        }
        let usage = self.usage_for(request);
        *self.last_usage.lock() = Some(usage);
        Ok(CompletionResponse {
            id: format!("{}-{call}", self.name),
            provider: self.name.clone(),
            model: "mock-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::assistant(self.response_text.clone()),
                finish_reason: Some(FinishReason::Stop),
            }],
            usage: Some(usage),
        })
    }

    async fn stream_complete(&self, request: &CompletionRequest) -> Result<ChunkStream, LlmError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(LlmError::Provider(message.clone()));
        }
        let chunks = self
            .chunks
            .clone()
            .unwrap_or_else(|| vec![self.response_text.clone()]);
        let delay = self.chunk_delay_ms;
        *self.last_usage.lock() = Some(self.usage_for(request));

        let total = chunks.len();
        let stream = stream! {
            for (index, delta) in chunks.into_iter().enumerate() {
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                let finish_reason = (index + 1 == total).then_some(FinishReason::Stop);
                yield Ok(StreamChunk {
                    delta,
                    finish_reason,
                });
            }
        };
        Ok(Box::pin(stream))
    }

    async fn generate_embedding(
        &self,
        text: &str,
        _model: Option<&str>,
    ) -> Result<Vec<f32>, LlmError> {
        if let Some(message) = &self.failure {
            return Err(LlmError::Provider(message.clone()));
        }
        // Deterministic toy embedding: byte histogram folded into 8 dims.
        let mut vector = vec![0f32; 8];
        for (index, byte) in text.bytes().enumerate() {
            vector[index % 8] += byte as f32 / 255.0;
        }
        Ok(vector)
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    fn last_token_usage(&self) -> Option<TokenUsage> {
        *self.last_usage.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn mock_reports_usage_after_completion() {
        let provider = MockLlmProvider::new("mock").with_response("four words long reply");
        let request = CompletionRequest::new(vec![ChatMessage::user("hello mock")]);
        assert!(provider.last_token_usage().is_none());
        provider.complete(&request).await.unwrap();
        let usage = provider.last_token_usage().unwrap();
        assert!(usage.input_tokens > 0);
        assert!(usage.output_tokens > 0);
    }

    #[tokio::test]
    async fn mock_stream_marks_the_last_chunk() {
        let provider = MockLlmProvider::new("mock").with_chunks(vec!["a", "b"]);
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let chunks: Vec<_> = provider
            .stream_complete(&request)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].as_ref().unwrap().finish_reason.is_none());
        assert_eq!(
            chunks[1].as_ref().unwrap().finish_reason,
            Some(FinishReason::Stop)
        );
    }

    #[tokio::test]
    async fn embeddings_are_deterministic() {
        let provider = MockLlmProvider::new("mock");
        let a = provider.generate_embedding("same text", None).await.unwrap();
        let b = provider.generate_embedding("same text", None).await.unwrap();
        assert_eq!(a, b);
    }
}
