//! Configuration for the MCP tool service, including Observee endpoint
//! resolution.

use serde::{Deserialize, Serialize};
use toolflow_types::ConfigError;

/// Hosted Observee MCP endpoint used when only an API key is given.
pub const OBSERVEE_ENDPOINT: &str = "https://mcp.observee.ai/mcp";

fn default_timeout() -> u64 {
    30000
}

fn default_server_name() -> String {
    "observee".to_string()
}

/// Connection settings for one MCP service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Streamable HTTP endpoint.
    pub url: String,
    /// Sent as `X-API-Key` when present.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Timeout for requests in milliseconds (default: 30000).
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

impl McpServerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout_ms: default_timeout(),
            server_name: default_server_name(),
        }
    }
}

/// Resolve the Observee service from explicit values and the environment.
///
/// Precedence: explicit `url` > explicit `api_key` > `OBSERVEE_URL` >
/// `OBSERVEE_API_KEY`. `client_id` falls back to `OBSERVEE_CLIENT_ID` and is
/// written into the URL query. An API key without a client id is an error.
/// Returns `Ok(None)` when nothing is configured.
pub fn resolve_observee(
    url: Option<&str>,
    api_key: Option<&str>,
    client_id: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Option<McpServerConfig>, ConfigError> {
    let client_id = client_id
        .map(str::to_string)
        .or_else(|| env("OBSERVEE_CLIENT_ID"))
        .filter(|id| !id.is_empty());

    let from_url = |url: &str| {
        let url = match &client_id {
            Some(id) => with_client_id(url, id),
            None => url.to_string(),
        };
        McpServerConfig::new(url)
    };
    let from_key = |key: &str, source: &str| match &client_id {
        Some(id) => Ok(McpServerConfig {
            api_key: Some(key.to_string()),
            ..McpServerConfig::new(format!("{OBSERVEE_ENDPOINT}?client_id={id}"))
        }),
        None => Err(ConfigError::MissingKey {
            key: format!("OBSERVEE_CLIENT_ID (required with {source})"),
        }),
    };

    if let Some(url) = url.filter(|u| !u.is_empty()) {
        return Ok(Some(from_url(url)));
    }
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        return from_key(key, "observee api_key").map(Some);
    }
    if let Some(url) = env("OBSERVEE_URL").filter(|u| !u.is_empty()) {
        return Ok(Some(from_url(&url)));
    }
    if let Some(key) = env("OBSERVEE_API_KEY").filter(|k| !k.is_empty()) {
        return from_key(&key, "OBSERVEE_API_KEY").map(Some);
    }
    Ok(None)
}

/// Replace an existing `client_id` query value, or append one.
fn with_client_id(url: &str, client_id: &str) -> String {
    if let Some(start) = url.find("client_id=") {
        let value_start = start + "client_id=".len();
        let value_end = url[value_start..]
            .find('&')
            .map_or(url.len(), |i| value_start + i);
        format!("{}{}{}", &url[..value_start], client_id, &url[value_end..])
    } else {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}client_id={client_id}")
    }
}
