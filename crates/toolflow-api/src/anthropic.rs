//! Anthropic Messages API provider.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use toolflow_types::{
    ApiError, ChatTurn, ChunkStream, ContentBlock, Message, Provider, ProviderChunk, Role,
    StopReason, ToolCallRequest, Usage,
};

use crate::client::{ApiClient, secret_header, trim_base};
use crate::retry::RetryConfig;
use crate::settings::ModelParams;
use crate::sse::SseEvent;
use crate::stream::{ChunkAssembler, ProviderStream, parse_arguments};

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
#[derive(Clone)]
pub struct AnthropicProvider {
    client: ApiClient,
    api_key: String,
    base_url: String,
    params: ModelParams,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        params: ModelParams,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new()?,
            api_key: api_key.into(),
            base_url: base_url.into(),
            params,
        })
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.client = self.client.with_retry_config(config);
        self
    }

    fn request_body(&self, turn: &ChatTurn) -> Value {
        let mut body = json!({
            "model": self.params.model,
            "max_tokens": self.params.max_tokens,
            "messages": turn.messages.iter().map(wire_message).collect::<Vec<_>>(),
            "stream": true,
        });
        if let Some(system) = &turn.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = self.params.temperature {
            body["temperature"] = json!(temperature);
        }
        if !turn.tools.is_empty() {
            body["tools"] = turn
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
        }
        body
    }

    async fn open(&self, turn: &ChatTurn) -> Result<ChunkStream, ApiError> {
        let url = format!("{}/v1/messages", trim_base(&self.base_url));
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", secret_header(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let events = self
            .client
            .open_sse(&url, headers, &self.request_body(turn))
            .await?;
        Ok(Box::pin(ProviderStream::new(
            events,
            AnthropicAssembler::default(),
        )))
    }
}

impl Provider for AnthropicProvider {
    fn stream_chat<'a>(
        &'a self,
        turn: &'a ChatTurn,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkStream, ApiError>> + Send + 'a>> {
        Box::pin(self.open(turn))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Tool results travel inside a `user` message on this API.
fn wire_message(message: &Message) -> Value {
    let role = match message.role {
        Role::Assistant => "assistant",
        Role::User | Role::Tool => "user",
    };
    let content: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => json!({"type": "text", "text": text}),
            ContentBlock::ToolUse { id, name, input } => {
                json!({"type": "tool_use", "id": id, "name": name, "input": input})
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
                ..
            } => {
                let mut v = json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                });
                if *is_error {
                    v["is_error"] = json!(true);
                }
                v
            }
        })
        .collect();
    json!({"role": role, "content": content})
}

// --- Wire events ---

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    MessageStart {
        message: WireMessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: WireBlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: WireDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: WireMessageDelta,
        #[serde(default)]
        usage: Option<WireUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: WireError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct WireMessageStart {
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireMessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

fn parse_stop_reason(s: &str) -> Option<StopReason> {
    match s {
        "end_turn" => Some(StopReason::EndTurn),
        "max_tokens" => Some(StopReason::MaxTokens),
        "stop_sequence" => Some(StopReason::StopSequence),
        "tool_use" => Some(StopReason::ToolUse),
        _ => None,
    }
}

/// A tool_use block whose input JSON is still arriving.
#[derive(Debug)]
struct PendingToolUse {
    id: String,
    name: String,
    json: String,
}

/// Turns content-block events into chunks, emitting each tool call once its
/// block closes.
#[derive(Debug, Default)]
struct AnthropicAssembler {
    tool_uses: HashMap<usize, PendingToolUse>,
    stop_reason: Option<StopReason>,
    usage: Usage,
}

impl ChunkAssembler for AnthropicAssembler {
    fn on_event(&mut self, event: SseEvent) -> Result<Vec<ProviderChunk>, ApiError> {
        let label = event.event_type.as_deref().unwrap_or("message");
        let wire: WireEvent = serde_json::from_str(&event.data)
            .map_err(|e| ApiError::StreamParse(format!("{label}: {e}")))?;

        match wire {
            WireEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.usage.input_tokens = usage.input_tokens.unwrap_or(0);
                    self.usage.output_tokens = usage.output_tokens;
                }
                Ok(vec![])
            }
            WireEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                WireBlockStart::Text { text } if !text.is_empty() => {
                    Ok(vec![ProviderChunk::TextDelta(text)])
                }
                WireBlockStart::ToolUse { id, name } => {
                    self.tool_uses.insert(
                        index,
                        PendingToolUse {
                            id,
                            name,
                            json: String::new(),
                        },
                    );
                    Ok(vec![])
                }
                _ => Ok(vec![]),
            },
            WireEvent::ContentBlockDelta { index, delta } => match delta {
                WireDelta::TextDelta { text } => Ok(vec![ProviderChunk::TextDelta(text)]),
                WireDelta::InputJsonDelta { partial_json } => {
                    if let Some(pending) = self.tool_uses.get_mut(&index) {
                        pending.json.push_str(&partial_json);
                    }
                    Ok(vec![])
                }
                WireDelta::Other => Ok(vec![]),
            },
            WireEvent::ContentBlockStop { index } => match self.tool_uses.remove(&index) {
                Some(pending) => {
                    let arguments = parse_arguments(&pending.name, &pending.json);
                    Ok(vec![ProviderChunk::ToolCall(ToolCallRequest {
                        id: pending.id,
                        name: pending.name,
                        arguments,
                    })])
                }
                None => Ok(vec![]),
            },
            WireEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason.as_deref() {
                    self.stop_reason = parse_stop_reason(reason);
                }
                if let Some(usage) = usage {
                    self.usage.output_tokens = usage.output_tokens;
                    if let Some(input) = usage.input_tokens {
                        self.usage.input_tokens = input;
                    }
                }
                Ok(vec![])
            }
            WireEvent::MessageStop => Ok(vec![ProviderChunk::Done {
                stop_reason: self.stop_reason,
                usage: std::mem::take(&mut self.usage),
            }]),
            WireEvent::Ping | WireEvent::Unknown => Ok(vec![]),
            WireEvent::Error { error } => Err(match error.kind.as_str() {
                "overloaded_error" => ApiError::Overloaded,
                "rate_limit_error" => ApiError::RateLimited {
                    retry_after_ms: None,
                },
                _ => ApiError::Server {
                    status: 500,
                    message: format!("{}: {}", error.kind, error.message),
                },
            }),
        }
    }
}
