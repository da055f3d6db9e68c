//! LlmClient trait definition

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CompletionRequest, CompletionResponse, LlmError, StreamChunk};

/// Stateless chat completion client - each call carries its full history
///
/// Sessions own their message history; the client never keeps conversation
/// state between calls.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Streaming completion
    ///
    /// Sends text deltas to the provided channel as they arrive and returns the
    /// concatenated response once the upstream signals end-of-stream. If the
    /// receiving side is dropped, reading stops and `LlmError::Cancelled` is
    /// returned.
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError>;
}
