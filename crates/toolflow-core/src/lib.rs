//! Streaming tool-calling orchestration for toolflow.
//!
//! [`chat_with_tools_stream`] builds a turn from a [`ToolflowConfig`] and a
//! [`ChatRequest`]; [`Orchestrator`] runs one over collaborators the caller
//! assembled.

mod chat;
mod orchestrator;

pub use chat::{
    ChatOutcome, ChatRequest, ToolCallRecord, build_dispatcher, chat_with_tools,
    chat_with_tools_stream, collect_turn,
};
pub use orchestrator::{Orchestrator, TurnState, TurnStream};
pub use toolflow_config::{ConfigOverrides, DEFAULT_MAX_ROUNDS, ToolflowConfig};
pub use toolflow_types::{Phase, StreamEvent, ToolflowError};
