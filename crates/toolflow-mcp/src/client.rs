//! MCP client: manages one service connection.
//!
//! Handles the MCP protocol handshake (initialize + initialized notification),
//! tool discovery (tools/list with cursor pagination), and tool invocation
//! (tools/call).

use serde::Deserialize;
use toolflow_types::{RemoteTools, ToolDescriptor, ToolError, ToolFuture, empty_object_schema};

use crate::config::McpServerConfig;
use crate::error::McpError;
use crate::transport::HttpTransport;

/// MCP protocol version we request.
const PROTOCOL_VERSION: &str = "2025-03-26";

/// Upper bound on tools/list pages, in case a server keeps handing out cursors.
const MAX_LIST_PAGES: usize = 50;

/// Result of calling a tool on an MCP server.
#[derive(Debug, Clone)]
pub struct McpToolResult {
    pub content: Vec<McpToolContent>,
    pub is_error: bool,
}

impl McpToolResult {
    /// Text items joined with newlines; non-text items are summarized.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                McpToolContent::Text { text } => text.clone(),
                McpToolContent::Image { mime_type, .. } => format!("[image: {mime_type}]"),
                McpToolContent::Resource { resource } => resource
                    .get("text")
                    .and_then(|t| t.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| resource.to_string()),
                McpToolContent::Other => "[unsupported content]".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A content item in a tool result.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum McpToolContent {
    Text {
        text: String,
    },
    Image {
        #[serde(default)]
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsListResult {
    tools: Vec<ToolEntry>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "empty_object_schema", rename = "inputSchema")]
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<McpToolContent>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

/// Client for a single MCP service.
pub struct McpClient {
    name: String,
    transport: HttpTransport,
}

impl McpClient {
    /// Connect to an MCP service: initialize handshake over HTTP.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, McpError> {
        let transport =
            HttpTransport::new(&config.url, config.api_key.clone(), config.timeout_ms)?;

        let init_params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "toolflow",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let name = config.server_name.clone();
        let result = transport
            .send_request("initialize", Some(init_params))
            .await?
            .into_result(&name)?;
        tracing::debug!(
            "MCP '{name}' negotiated protocol {}",
            result["protocolVersion"].as_str().unwrap_or("unknown")
        );

        transport
            .send_notification("notifications/initialized", None)
            .await?;

        tracing::info!("MCP server '{name}' connected at {}", redact(transport.endpoint()));
        Ok(Self { name, transport })
    }

    /// Discover every tool the service exposes, following `nextCursor`.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let result = self
                .transport
                .send_request("tools/list", params)
                .await?
                .into_result(&self.name)?;
            let page: ToolsListResult = serde_json::from_value(result).map_err(|e| {
                McpError::Protocol(format!("Failed to parse tools/list response: {e}"))
            })?;

            tools.extend(page.tools.into_iter().map(|t| {
                ToolDescriptor::new(t.name, t.description.unwrap_or_default(), t.input_schema)
            }));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!("MCP '{}' lists {} tools", self.name, tools.len());
        Ok(tools)
    }

    /// Call a tool on this service.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<McpToolResult, McpError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let result = self
            .transport
            .send_request("tools/call", Some(params))
            .await?
            .into_result(&self.name)?;

        let call_result: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))?;

        Ok(McpToolResult {
            content: call_result.content,
            is_error: call_result.is_error,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.name
    }
}

impl RemoteTools for McpClient {
    fn list_tools(&self) -> ToolFuture<'_, Vec<ToolDescriptor>> {
        Box::pin(async move {
            McpClient::list_tools(self)
                .await
                .map_err(|e| ToolError::Remote {
                    tool: "tools/list".to_string(),
                    message: e.to_string(),
                })
        })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: serde_json::Value,
    ) -> ToolFuture<'a, String> {
        Box::pin(async move {
            let result = McpClient::call_tool(self, name, arguments)
                .await
                .map_err(|e| ToolError::Remote {
                    tool: name.to_string(),
                    message: e.to_string(),
                })?;
            if result.is_error {
                return Err(ToolError::Remote {
                    tool: name.to_string(),
                    message: result.text(),
                });
            }
            Ok(result.text())
        })
    }
}

/// Drop the query string (it may carry a client id) before logging a URL.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_entry_defaults() {
        let entry: ToolEntry = serde_json::from_str(r#"{"name": "list"}"#).unwrap();
        assert_eq!(entry.name, "list");
        assert!(entry.description.is_none());
        assert_eq!(entry.input_schema["type"], "object");
    }

    #[test]
    fn tools_list_page_with_cursor() {
        let page: ToolsListResult = serde_json::from_str(
            r#"{"tools":[{"name":"a","inputSchema":{"type":"object"}}],"nextCursor":"page2"}"#,
        )
        .unwrap();
        assert_eq!(page.tools.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("page2"));
    }

    #[test]
    fn result_text_joins_items() {
        let result: ToolCallResult = serde_json::from_str(
            r#"{"content":[
                {"type":"text","text":"line one"},
                {"type":"image","data":"xx","mimeType":"image/png"},
                {"type":"resource","resource":{"uri":"file:///a","text":"body"}},
                {"type":"audio","data":"yy"}
            ]}"#,
        )
        .unwrap();
        let result = McpToolResult {
            content: result.content,
            is_error: result.is_error,
        };
        assert_eq!(
            result.text(),
            "line one\n[image: image/png]\nbody\n[unsupported content]"
        );
        assert!(!result.is_error);
    }

    #[test]
    fn redact_strips_query() {
        assert_eq!(
            redact("https://mcp.observee.ai/mcp?client_id=abc"),
            "https://mcp.observee.ai/mcp"
        );
        assert_eq!(redact("http://localhost/mcp"), "http://localhost/mcp");
    }
}
