//! Chat completion request/response types
//!
//! These model the OpenAI-compatible Chat Completions API used by the
//! upstream provider (DeepSeek by default).

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one upstream call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Full ordered conversation, system message first
    pub messages: Vec<Message>,

    /// Max tokens for the response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    /// Create a request for the given messages
    pub fn new(messages: Vec<Message>, max_tokens: u32, temperature: f32) -> Self {
        debug!(message_count = %messages.len(), %max_tokens, "CompletionRequest::new: called");
        Self {
            messages,
            max_tokens,
            temperature,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        debug!("Message::system: called");
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        debug!("Message::user: called");
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        debug!("Message::assistant: called");
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Response from a completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Full text content (concatenated deltas when streaming)
    pub content: String,

    /// Upstream finish reason, if reported
    pub finish_reason: Option<String>,

    /// Token usage, if reported
    pub usage: TokenUsage,
}

/// Token usage as reported by the upstream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Streaming chunk forwarded to the consumer as it arrives
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text being generated
    TextDelta(String),

    /// Upstream signalled end-of-stream
    MessageDone { finish_reason: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);

        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "Hi there");
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(Message::user("hello")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn test_message_roundtrip_system() {
        let msg: Message = serde_json::from_str(r#"{"role":"system","content":"x"}"#).unwrap();
        assert_eq!(msg, Message::system("x"));
    }
}
