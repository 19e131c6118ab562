//! Tool descriptors and the two dispatch seams: remote service and custom handler.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::error::ToolError;

/// Boxed future returned by the tool seams.
pub type ToolFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ToolError>> + Send + 'a>>;

/// A tool offered to the model: name, description and JSON parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
}

pub fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Where a tool call is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    /// Delegated to the external MCP service.
    Remote,
    /// Delegated to the caller-supplied handler.
    Custom,
}

/// A tool invocation requested by the model, with fully assembled arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The external tool service (an MCP server in production).
///
/// Dyn-compatible so the orchestrator can hold `Arc<dyn RemoteTools>`.
pub trait RemoteTools: Send + Sync {
    /// List every tool the service exposes.
    fn list_tools(&self) -> ToolFuture<'_, Vec<ToolDescriptor>>;

    /// Call a tool and return its text result. Service-side failures are
    /// reported as [`ToolError::Remote`].
    fn call_tool<'a>(&'a self, name: &'a str, arguments: serde_json::Value)
    -> ToolFuture<'a, String>;
}

/// Caller-supplied executor for custom tools.
///
/// Results may be any JSON value; they are normalized to text before they
/// enter the conversation.
pub trait CustomToolHandler: Send + Sync {
    fn call<'a>(
        &'a self,
        tool_name: &'a str,
        arguments: serde_json::Value,
    ) -> ToolFuture<'a, serde_json::Value>;
}
