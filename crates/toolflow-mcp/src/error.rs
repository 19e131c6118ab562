//! Error types for MCP operations.

use thiserror::Error;
use toolflow_types::ToolflowError;

/// Errors from MCP service communication.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("MCP endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error talking to MCP service: {0}")]
    Network(String),

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<McpError> for ToolflowError {
    fn from(err: McpError) -> Self {
        ToolflowError::Mcp(err.to_string())
    }
}
