//! Upstream chat completion client
//!
//! Provides the `LlmClient` abstraction, the OpenAI-compatible implementation
//! and the incremental stream decoder it uses.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod openai;
mod sse;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use sse::{SseDecoder, SseFrame};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StreamChunk, TokenUsage};

use crate::config::LlmConfig;

/// Create the upstream client described by the config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(model = %config.model, base_url = %config.base_url, "create_client: called");
    Ok(Arc::new(OpenAIClient::from_config(config)?))
}
