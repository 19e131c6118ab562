//! MCP (Model Context Protocol) client for toolflow.
//!
//! Talks to a single remote tool service over the Streamable HTTP transport:
//! JSON-RPC 2.0 messages POSTed to one endpoint, answered with JSON or SSE.
//! Only the subset a tool-calling loop needs is implemented: the initialize
//! handshake, `tools/list` and `tools/call`.

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
mod transport;

pub use client::{McpClient, McpToolContent, McpToolResult};
pub use config::{McpServerConfig, OBSERVEE_ENDPOINT, resolve_observee};
pub use error::McpError;
