use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::LlmError;
use crate::provider::{ChunkStream, LlmProvider};
use crate::types::{
    ChatMessage, Choice, CompletionRequest, CompletionResponse, FinishReason,
    ProviderCapabilities, Role, StreamChunk, TokenUsage,
};

/// Configuration for an OpenAI-compatible chat-completions backend.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Keys rotated on 429 responses.
    pub api_keys: Vec<String>,
    pub model: String,
    pub embedding_model: String,
    pub api_base: String,
    pub timeout: Duration,
    /// Blended price per 1k tokens, for usage cost accounting.
    pub cost_per_1k_tokens: f64,
    pub capabilities: ProviderCapabilities,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            cost_per_1k_tokens: 0.0006,
            capabilities: ProviderCapabilities {
                supports_streaming: true,
                supports_function_calling: true,
                supports_vision: false,
                supports_embeddings: true,
                max_context_tokens: 128_000,
                max_output_tokens: 16_384,
            },
        }
    }
}

/// Adapter for any endpoint speaking the OpenAI chat-completions dialect.
/// The wire structs stay private to this module.
pub struct OpenAiCompatibleProvider {
    name: String,
    client: Client,
    config: OpenAiConfig,
    last_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: impl Into<String>, config: OpenAiConfig) -> Result<Self, LlmError> {
        let name = name.into();
        if config.api_keys.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: name,
                message: "no API key configured".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| LlmError::Provider(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            name,
            client,
            config,
            last_usage: Mutex::new(None),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.api_base.trim_end_matches('/'))
    }

    fn wire_request(&self, request: &CompletionRequest, stream: bool) -> WireChatRequest {
        WireChatRequest {
            model: self.config.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|message| WireMessage {
                    role: role_name(message.role).to_string(),
                    content: message.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    fn record_usage(&self, usage: Option<&WireUsage>) -> Option<TokenUsage> {
        let usage = usage?;
        let total = usage.prompt_tokens + usage.completion_tokens;
        let tracked = TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cost_usd: total as f64 / 1_000.0 * self.config.cost_per_1k_tokens,
        };
        *self.last_usage.lock() = Some(tracked);
        Some(tracked)
    }

    /// POST the payload, rotating across API keys on 429.
    async fn post_rotating(
        &self,
        url: &str,
        payload: &impl Serialize,
    ) -> Result<reqwest::Response, LlmError> {
        let mut last_error: Option<LlmError> = None;
        for (index, key) in self.config.api_keys.iter().enumerate() {
            let response = self
                .client
                .post(url)
                .bearer_auth(key)
                .json(payload)
                .send()
                .await;
            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    last_error = Some(LlmError::Provider(format!("request failed: {err}")));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 && index + 1 < self.config.api_keys.len() {
                warn!(
                    target: "openai_provider",
                    provider = %self.name,
                    attempt = index + 1,
                    remaining = self.config.api_keys.len() - index - 1,
                    "rate limited; rotating API key"
                );
                last_error = Some(LlmError::Http {
                    provider: self.name.clone(),
                    status: 429,
                    message: truncate_body(&body),
                });
                continue;
            }
            return Err(LlmError::Http {
                provider: self.name.clone(),
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }
        Err(last_error.unwrap_or_else(|| LlmError::Provider("no API key accepted".to_string())))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let payload = self.wire_request(request, false);
        let response = self.post_rotating(&self.completions_url(), &payload).await?;
        let wire: WireChatResponse = response.json().await.map_err(|err| {
            LlmError::InvalidResponse {
                provider: self.name.clone(),
                message: err.to_string(),
            }
        })?;
        let usage = self.record_usage(wire.usage.as_ref());
        into_response(wire, usage, &self.name, &self.config.model)
    }

    async fn stream_complete(&self, request: &CompletionRequest) -> Result<ChunkStream, LlmError> {
        let payload = self.wire_request(request, true);
        let response = self.post_rotating(&self.completions_url(), &payload).await?;
        let provider = self.name.clone();

        let stream = stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            'outer: while let Some(part) = bytes.next().await {
                let part = match part {
                    Ok(part) => part,
                    Err(err) => {
                        yield Err(LlmError::Stream(format!("{provider}: {err}")));
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&part));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    match parse_sse_line(&line) {
                        SseEvent::Chunk(chunk) => yield Ok(chunk),
                        SseEvent::Done => break 'outer,
                        SseEvent::Skip => {}
                        SseEvent::Malformed(message) => {
                            yield Err(LlmError::Stream(format!("{provider}: {message}")));
                            break 'outer;
                        }
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn generate_embedding(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Vec<f32>, LlmError> {
        let payload = WireEmbeddingRequest {
            model: model.unwrap_or(&self.config.embedding_model).to_string(),
            input: text.to_string(),
        };
        let response = self.post_rotating(&self.embeddings_url(), &payload).await?;
        let wire: WireEmbeddingResponse = response.json().await.map_err(|err| {
            LlmError::InvalidResponse {
                provider: self.name.clone(),
                message: err.to_string(),
            }
        })?;
        wire.data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: self.name.clone(),
                message: "embedding response carried no vectors".to_string(),
            })
    }

    async fn is_available(&self) -> bool {
        !self.config.api_keys.is_empty()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.config.capabilities
    }

    fn last_token_usage(&self) -> Option<TokenUsage> {
        *self.last_usage.lock()
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let cut = body
        .char_indices()
        .take_while(|(index, _)| *index < MAX)
        .last()
        .map(|(index, ch)| index + ch.len_utf8())
        .unwrap_or(0);
    format!("{}... [truncated]", &body[..cut])
}

fn into_response(
    wire: WireChatResponse,
    usage: Option<TokenUsage>,
    provider: &str,
    model: &str,
) -> Result<CompletionResponse, LlmError> {
    if wire.choices.is_empty() {
        return Err(LlmError::InvalidResponse {
            provider: provider.to_string(),
            message: "response carried no choices".to_string(),
        });
    }
    Ok(CompletionResponse {
        id: wire.id,
        provider: provider.to_string(),
        model: model.to_string(),
        choices: wire
            .choices
            .into_iter()
            .enumerate()
            .map(|(index, choice)| Choice {
                index: index as u32,
                message: ChatMessage::assistant(choice.message.content.unwrap_or_default()),
                finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
            })
            .collect(),
        usage,
    })
}

fn parse_finish_reason(raw: Option<&str>) -> Option<FinishReason> {
    match raw {
        Some("stop") => Some(FinishReason::Stop),
        Some("length") => Some(FinishReason::Length),
        Some("tool_calls") | Some("function_call") => Some(FinishReason::ToolCalls),
        Some(_) => Some(FinishReason::Error),
        None => None,
    }
}

enum SseEvent {
    Chunk(StreamChunk),
    Done,
    Skip,
    Malformed(String),
}

/// One SSE line: `data: {json}` or `data: [DONE]`; everything else is
/// framing noise.
fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return SseEvent::Skip;
    }
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    match serde_json::from_str::<WireStreamChunk>(data) {
        Ok(chunk) => {
            let choice = chunk.choices.into_iter().next();
            let delta = choice
                .as_ref()
                .and_then(|choice| choice.delta.content.clone())
                .unwrap_or_default();
            let finish_reason =
                choice.and_then(|choice| parse_finish_reason(choice.finish_reason.as_deref()));
            SseEvent::Chunk(StreamChunk {
                delta,
                finish_reason,
            })
        }
        Err(err) => SseEvent::Malformed(err.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct WireChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    #[serde(default)]
    id: String,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    #[serde(default)]
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireEmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingEntry {
    embedding: Vec<f32>,
}
