//! Events emitted to the caller of a turn.

use serde::Serialize;

/// Lifecycle markers within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The first provider round is starting.
    InitialResponse,
    /// Tool calls were requested and are about to be dispatched.
    ToolDispatch,
    /// Tool results were sent back and the provider is being re-invoked.
    FollowUp,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::InitialResponse => "initial_response",
            Phase::ToolDispatch => "tool_dispatch",
            Phase::FollowUp => "follow_up",
        }
    }
}

/// A progress event of a running turn.
///
/// A turn's event sequence always ends with exactly one [`StreamEvent::FinalContent`]
/// or exactly one [`StreamEvent::Error`], never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The tools offered to the model for this turn.
    Manifest {
        tools: Vec<String>,
        used_filtering: bool,
    },
    /// Partial assistant text.
    Content { content: String },
    Phase { phase: Phase },
    /// A tool call requested by the model.
    ToolCall {
        id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    /// The result (or captured failure) of one tool call.
    ToolResult {
        call_id: String,
        tool_name: String,
        result: String,
        is_error: bool,
    },
    /// Terminal assistant text of the turn.
    FinalContent { content: String },
    /// Terminal failure of the turn.
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::FinalContent { .. } | StreamEvent::Error { .. }
        )
    }
}
