//! Streamable HTTP transport for MCP.
//!
//! Each JSON-RPC message is POSTed to a single endpoint. The server answers
//! either with a plain JSON body or with an SSE body carrying the response.
//! A session id handed out on `initialize` is echoed on every later request.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use toolflow_api::sse::SseParser;

use crate::error::McpError;
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

const SESSION_HEADER: &str = "mcp-session-id";

pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, McpError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| McpError::Network(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
            timeout_ms,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|s| s.clone())
    }

    /// Send a JSON-RPC request and wait for the matching response.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let exchange = async {
            let response = self.post(body).await?;
            let status = response.status();
            let is_sse = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("text/event-stream"));
            let text = response
                .text()
                .await
                .map_err(|e| McpError::Network(e.to_string()))?;

            if !status.is_success() {
                return Err(McpError::Http {
                    status: status.as_u16(),
                    body: text,
                });
            }
            if is_sse {
                find_in_sse(&text, id)
            } else {
                Ok(serde_json::from_str(&text)?)
            }
        };

        match tokio::time::timeout(Duration::from_millis(self.timeout_ms), exchange).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout {
                method: method.to_string(),
                timeout_ms: self.timeout_ms,
            }),
        }
    }

    /// Send a JSON-RPC notification. Servers acknowledge with 202 and no body.
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let body = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        let response = tokio::time::timeout(Duration::from_millis(self.timeout_ms), self.post(body))
            .await
            .map_err(|_| McpError::Timeout {
                method: method.to_string(),
                timeout_ms: self.timeout_ms,
            })??;

        let status = response.status();
        if !status.is_success() {
            return Err(McpError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn post(&self, body: String) -> Result<reqwest::Response, McpError> {
        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers()?)
            .body(body)
            .send()
            .await
            .map_err(|e| McpError::Network(e.to_string()))?;

        if let Some(sid) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut slot) = self.session_id.lock() {
                if slot.as_deref() != Some(sid) {
                    tracing::debug!("MCP session established: {sid}");
                    *slot = Some(sid.to_string());
                }
            }
        }
        Ok(response)
    }

    fn headers(&self) -> Result<HeaderMap, McpError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );
        if let Some(key) = &self.api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| McpError::Protocol("Invalid API key format".into()))?;
            value.set_sensitive(true);
            headers.insert("x-api-key", value);
        }
        if let Some(sid) = self.session_id() {
            let value = HeaderValue::from_str(&sid)
                .map_err(|_| McpError::Protocol("Invalid session id".into()))?;
            headers.insert(SESSION_HEADER, value);
        }
        Ok(headers)
    }
}

/// Pick the response with the given id out of an SSE body. Server
/// notifications and responses to other requests are skipped.
fn find_in_sse(body: &str, id: u64) -> Result<JsonRpcResponse, McpError> {
    let mut parser = SseParser::new();
    let mut events = parser.feed(body.as_bytes());
    events.extend(parser.finish());

    for event in events {
        match serde_json::from_str::<JsonRpcResponse>(&event.data) {
            Ok(resp) if resp.id == Some(id) => return Ok(resp),
            Ok(_) => continue,
            Err(e) => tracing::warn!("Skipping unparseable MCP event: {e}"),
        }
    }
    Err(McpError::Protocol(format!(
        "SSE response did not contain a reply to request {id}"
    )))
}
