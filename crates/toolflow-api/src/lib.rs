//! Streaming language-model providers for toolflow.
//!
//! Each provider translates canonical [`toolflow_types::ChatTurn`]s into its
//! native request format and reassembles the streamed response into
//! [`toolflow_types::ProviderChunk`]s.

mod anthropic;
mod client;
mod gemini;
mod openai;
mod retry;
mod settings;
pub mod sse;
mod stream;

pub use anthropic::AnthropicProvider;
pub use client::ApiClient;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use retry::{RetryConfig, is_retryable};
pub use settings::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, ModelParams, ProviderKind, ProviderSettings,
    build_provider,
};
pub use stream::{ChunkAssembler, ProviderStream, SseStream};
