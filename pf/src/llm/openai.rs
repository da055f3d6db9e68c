//! OpenAI-compatible chat completions client
//!
//! Implements the LlmClient trait for any endpoint speaking the OpenAI Chat
//! Completions wire format (DeepSeek by default) with both blocking and
//! streaming responses. No retries: a failure surfaces to the caller at once.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::sse::{SseDecoder, SseFrame};
use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StreamChunk, TokenUsage};
use crate::config::LlmConfig;

/// OpenAI-compatible API client
pub struct OpenAIClient {
    model: String,
    api_key_env: String,
    base_url: String,
    http: Client,
}

impl OpenAIClient {
    /// Create a new client from configuration
    ///
    /// The API key is not read here; it is looked up on every call so a
    /// missing credential fails the call rather than server start-up.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(?config, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn api_key(&self) -> Result<String, LlmError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => {
                debug!(env = %self.api_key_env, "api_key: not set");
                Err(LlmError::MissingApiKey(self.api_key_env.clone()))
            }
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Build the request body for the chat completions API
    fn build_request_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, %stream, "build_request_body: called");
        serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": stream,
        })
    }

    /// POST the body and reject non-2xx statuses
    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, LlmError> {
        let api_key = self.api_key()?;
        let response = self
            .http
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(LlmError::Network)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            debug!(%status, "post: API error");
            return Err(LlmError::ApiError { status, message });
        }
        Ok(response)
    }
}

/// Accumulates stream state while frames are applied
#[derive(Default)]
struct StreamState {
    content: String,
    finish_reason: Option<String>,
    done: bool,
}

impl StreamState {
    /// Apply one frame; forwards deltas and fails if the consumer is gone
    async fn apply(&mut self, frame: SseFrame, chunk_tx: &mpsc::Sender<StreamChunk>) -> Result<(), LlmError> {
        match frame {
            SseFrame::Delta { text, finish_reason } => {
                if finish_reason.is_some() {
                    self.finish_reason = finish_reason;
                }
                self.content.push_str(&text);
                chunk_tx
                    .send(StreamChunk::TextDelta(text))
                    .await
                    .map_err(|_| LlmError::Cancelled)?;
            }
            SseFrame::Empty { finish_reason } => {
                if finish_reason.is_some() {
                    self.finish_reason = finish_reason;
                }
            }
            SseFrame::Done => {
                self.done = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let body = self.build_request_body(&request, false);
        let response = self.post(&body).await?;

        let text = response.text().await.map_err(LlmError::Network)?;
        let api_response: ChatResponse = serde_json::from_str(&text)?;
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        debug!("complete: success");
        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: api_response.usage.map(TokenUsage::from).unwrap_or_default(),
        })
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "stream: called");
        let body = self.build_request_body(&request, true);
        let response = self.post(&body).await?;

        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut state = StreamState::default();

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(LlmError::Network)?;
            for frame in decoder.push(&chunk) {
                state.apply(frame, &chunk_tx).await?;
                if state.done {
                    debug!("stream: done sentinel received");
                    break 'read;
                }
            }
        }

        if !state.done {
            if let Some(frame) = decoder.finish() {
                state.apply(frame, &chunk_tx).await?;
            }
            if !state.done {
                warn!(
                    content_len = state.content.len(),
                    "Upstream stream ended without [DONE], completing with accumulated text"
                );
            }
        }

        let _ = chunk_tx
            .send(StreamChunk::MessageDone {
                finish_reason: state.finish_reason.clone(),
            })
            .await;

        Ok(CompletionResponse {
            content: state.content,
            finish_reason: state.finish_reason,
            usage: TokenUsage::default(),
        })
    }
}

// Chat completions response types

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl From<ChatUsage> for TokenUsage {
    fn from(u: ChatUsage) -> Self {
        Self {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }
    }
}
