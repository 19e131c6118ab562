//! Provider trait for language-model backends.

use crate::{ApiError, Message, StopReason, ToolCallRequest, ToolDescriptor, Usage};
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;

/// What a provider is asked to continue: system prompt, turn so far, manifest.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
}

/// One item of a provider's streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderChunk {
    /// Partial assistant text, in arrival order.
    TextDelta(String),
    /// A tool call whose arguments have been fully received.
    ToolCall(ToolCallRequest),
    /// The response is complete.
    Done {
        stop_reason: Option<StopReason>,
        usage: Usage,
    },
}

/// A boxed async stream of chunks from a provider.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ProviderChunk, ApiError>> + Send>>;

/// Trait for language-model providers (Anthropic, Gemini, OpenAI).
///
/// Providers translate between canonical toolflow messages and their native
/// API format. Dyn-compatible so the orchestrator works with `Arc<dyn Provider>`.
pub trait Provider: Send + Sync {
    /// Open a streaming response for the given turn.
    fn stream_chat<'a>(
        &'a self,
        turn: &'a ChatTurn,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkStream, ApiError>> + Send + 'a>>;

    /// Provider name for logging (e.g., "anthropic").
    fn name(&self) -> &str;
}
