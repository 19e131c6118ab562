//! OpenAI Chat Completions provider (streaming).

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use reqwest::header::HeaderMap;
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

#[derive(Clone)]
pub struct OpenAiProvider {
    client: ApiClient,
    api_key: String,
    base_url: String,
    params: ModelParams,
}

impl OpenAiProvider {
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

    /// Accepts a base with or without the `/v1` suffix.
    fn endpoint(&self) -> String {
        let base = trim_base(&self.base_url);
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/chat/completions")
    }

    fn request_body(&self, turn: &ChatTurn) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &turn.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        for message in &turn.messages {
            push_wire_messages(message, &mut messages);
        }

        let mut body = json!({
            "model": self.params.model,
            "messages": messages,
            "max_tokens": self.params.max_tokens,
            "stream": true,
            "stream_options": {"include_usage": true},
        });
        if let Some(temperature) = self.params.temperature {
            body["temperature"] = json!(temperature);
        }
        if !turn.tools.is_empty() {
            body["tools"] = turn
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
        }
        body
    }

    async fn open(&self, turn: &ChatTurn) -> Result<ChunkStream, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            secret_header(&format!("Bearer {}", self.api_key))?,
        );

        let events = self
            .client
            .open_sse(&self.endpoint(), headers, &self.request_body(turn))
            .await?;
        Ok(Box::pin(ProviderStream::new(
            events,
            OpenAiAssembler::default(),
        )))
    }
}

impl Provider for OpenAiProvider {
    fn stream_chat<'a>(
        &'a self,
        turn: &'a ChatTurn,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkStream, ApiError>> + Send + 'a>> {
        Box::pin(self.open(turn))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// One canonical message may expand to several wire messages: every tool
/// result is its own `tool` message.
fn push_wire_messages(message: &Message, out: &mut Vec<Value>) {
    match message.role {
        Role::User => out.push(json!({"role": "user", "content": message.text()})),
        Role::Assistant => {
            let text = message.text();
            let tool_calls: Vec<Value> = message
                .tool_uses()
                .map(|(id, name, input)| {
                    json!({
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": input.to_string()},
                    })
                })
                .collect();
            let content = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
            let mut wire = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                wire["tool_calls"] = json!(tool_calls);
            }
            out.push(wire);
        }
        Role::Tool => {
            for block in &message.content {
                if let ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } = block
                {
                    out.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    }));
                }
            }
        }
    }
}

// --- Wire chunks ---

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates tool-call fragments by index; calls are released when the
/// choice finishes, `Done` when `[DONE]` arrives.
#[derive(Debug, Default)]
struct OpenAiAssembler {
    calls: BTreeMap<usize, PartialCall>,
    stop_reason: Option<StopReason>,
    usage: Usage,
}

impl OpenAiAssembler {
    fn flush_calls(&mut self) -> Vec<ProviderChunk> {
        std::mem::take(&mut self.calls)
            .into_values()
            .map(|call| {
                ProviderChunk::ToolCall(ToolCallRequest {
                    arguments: parse_arguments(&call.name, &call.arguments),
                    id: call.id,
                    name: call.name,
                })
            })
            .collect()
    }
}

impl ChunkAssembler for OpenAiAssembler {
    fn on_event(&mut self, event: SseEvent) -> Result<Vec<ProviderChunk>, ApiError> {
        if event.data.trim() == "[DONE]" {
            let mut out = self.flush_calls();
            out.push(ProviderChunk::Done {
                stop_reason: self.stop_reason,
                usage: std::mem::take(&mut self.usage),
            });
            return Ok(out);
        }

        let chunk: WireChunk = serde_json::from_str(&event.data)
            .map_err(|e| ApiError::StreamParse(format!("openai chunk: {e}")))?;

        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            };
        }

        let mut out = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                out.push(ProviderChunk::TextDelta(text));
            }
            for fragment in choice.delta.tool_calls {
                let call = self.calls.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    call.id = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        call.name.push_str(&name);
                    }
                    if let Some(args) = function.arguments {
                        call.arguments.push_str(&args);
                    }
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.stop_reason = match reason.as_str() {
                    "stop" => Some(StopReason::EndTurn),
                    "length" => Some(StopReason::MaxTokens),
                    "tool_calls" | "function_call" => Some(StopReason::ToolUse),
                    _ => None,
                };
                out.extend(self.flush_calls());
            }
        }
        Ok(out)
    }
}
