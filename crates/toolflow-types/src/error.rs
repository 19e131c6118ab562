//! Error hierarchy for toolflow.
//!
//! Only configuration and transport failures are fatal to a turn. Every
//! [`ToolError`] is captured as a tool-result payload and handed back to the
//! model instead.

use thiserror::Error;

/// Top-level error type for all toolflow operations.
#[derive(Debug, Error)]
pub enum ToolflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Api(#[from] ApiError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("MCP service error: {0}")]
    Mcp(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Transport-level errors from a language-model provider.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Server overloaded")]
    Overloaded,

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream parse error: {0}")]
    StreamParse(String),

    #[error("Request timeout")]
    Timeout,
}

/// Errors from resolving or running a single tool call.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Remote tool '{tool}' failed: {message}")]
    Remote { tool: String, message: String },

    #[error("Custom tool '{tool}' failed: {message}")]
    Custom { tool: String, message: String },
}

/// Errors detected while assembling a turn, before any streaming starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown provider '{name}' (available: {available})")]
    UnknownProvider { name: String, available: String },

    #[error("Custom tools declared ({tools}) but no custom tool handler was supplied")]
    MissingCustomHandler { tools: String },

    #[error("Tool '{name}' is registered more than once")]
    DuplicateTool { name: String },

    #[error("Message must not be empty")]
    EmptyMessage,
}
