//! Google Gemini `streamGenerateContent` provider.
//!
//! Gemini has no end-of-stream event: a response is complete when the body
//! closes after a candidate carried a `finishReason`.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use toolflow_types::{
    ApiError, ChatTurn, ChunkStream, ContentBlock, Message, Provider, ProviderChunk, Role,
    StopReason, ToolCallRequest, Usage,
};

use crate::client::{ApiClient, secret_header, trim_base};
use crate::retry::RetryConfig;
use crate::settings::ModelParams;
use crate::sse::SseEvent;
use crate::stream::{ChunkAssembler, ProviderStream};

/// JSON-schema keys the function-declaration schema accepts.
const SCHEMA_KEYS: &[&str] = &[
    "type",
    "format",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
];

#[derive(Clone)]
pub struct GeminiProvider {
    client: ApiClient,
    api_key: String,
    base_url: String,
    params: ModelParams,
}

impl GeminiProvider {
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
        let mut generation = json!({"maxOutputTokens": self.params.max_tokens});
        if let Some(temperature) = self.params.temperature {
            generation["temperature"] = json!(temperature);
        }

        let mut body = json!({
            "contents": turn.messages.iter().map(wire_content).collect::<Vec<_>>(),
            "generationConfig": generation,
        });
        if let Some(system) = &turn.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if !turn.tools.is_empty() {
            let declarations: Vec<Value> = turn
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": sanitize_schema(&t.parameters),
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }
        body
    }

    async fn open(&self, turn: &ChatTurn) -> Result<ChunkStream, ApiError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            trim_base(&self.base_url),
            self.params.model
        );
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", secret_header(&self.api_key)?);

        let events = self
            .client
            .open_sse(&url, headers, &self.request_body(turn))
            .await?;
        Ok(Box::pin(ProviderStream::new(
            events,
            GeminiAssembler::default(),
        )))
    }
}

impl Provider for GeminiProvider {
    fn stream_chat<'a>(
        &'a self,
        turn: &'a ChatTurn,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkStream, ApiError>> + Send + 'a>> {
        Box::pin(self.open(turn))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn wire_content(message: &Message) -> Value {
    let role = match message.role {
        Role::Assistant => "model",
        Role::User | Role::Tool => "user",
    };
    let parts: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => json!({"text": text}),
            ContentBlock::ToolUse { name, input, .. } => {
                json!({"functionCall": {"name": name, "args": input}})
            }
            ContentBlock::ToolResult {
                name,
                content,
                is_error,
                ..
            } => {
                let key = if *is_error { "error" } else { "result" };
                json!({"functionResponse": {"name": name, "response": {key: content}}})
            }
        })
        .collect();
    json!({"role": role, "parts": parts})
}

/// Drop schema keys the function-declaration format rejects
/// (`$schema`, `additionalProperties`, `default`, ...).
fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if !SCHEMA_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let cleaned = match key.as_str() {
                    "properties" => match value {
                        Value::Object(props) => Value::Object(
                            props
                                .iter()
                                .map(|(name, prop)| (name.clone(), sanitize_schema(prop)))
                                .collect(),
                        ),
                        other => other.clone(),
                    },
                    "items" => sanitize_schema(value),
                    _ => value.clone(),
                };
                out.insert(key.clone(), cleaned);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

// --- Wire chunks ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChunk {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    usage_metadata: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<WireFunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Default)]
struct GeminiAssembler {
    finish_reason: Option<String>,
    saw_function_call: bool,
    usage: Usage,
}

impl ChunkAssembler for GeminiAssembler {
    fn on_event(&mut self, event: SseEvent) -> Result<Vec<ProviderChunk>, ApiError> {
        let chunk: WireChunk = serde_json::from_str(&event.data)
            .map_err(|e| ApiError::StreamParse(format!("gemini chunk: {e}")))?;

        if let Some(usage) = chunk.usage_metadata {
            self.usage = Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            };
        }

        let mut out = Vec::new();
        // Only the first candidate is requested.
        if let Some(candidate) = chunk.candidates.into_iter().next() {
            for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                if part.thought {
                    continue;
                }
                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    out.push(ProviderChunk::TextDelta(text));
                }
                if let Some(call) = part.function_call {
                    self.saw_function_call = true;
                    out.push(ProviderChunk::ToolCall(ToolCallRequest {
                        id: call
                            .id
                            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                        name: call.name,
                        arguments: call.args.unwrap_or_else(|| json!({})),
                    }));
                }
            }
            if candidate.finish_reason.is_some() {
                self.finish_reason = candidate.finish_reason;
            }
        }
        Ok(out)
    }

    fn on_end(&mut self) -> Vec<ProviderChunk> {
        // A body that closes before any finishReason was truncated; leaving
        // out Done lets the caller report the dropped stream.
        let Some(reason) = self.finish_reason.take() else {
            return Vec::new();
        };
        let stop_reason = if self.saw_function_call {
            Some(StopReason::ToolUse)
        } else {
            match reason.as_str() {
                "STOP" => Some(StopReason::EndTurn),
                "MAX_TOKENS" => Some(StopReason::MaxTokens),
                _ => None,
            }
        };
        vec![ProviderChunk::Done {
            stop_reason,
            usage: std::mem::take(&mut self.usage),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolflow_types::ToolDescriptor;

    fn data(v: Value) -> SseEvent {
        SseEvent {
            event_type: None,
            data: v.to_string(),
        }
    }

    #[test]
    fn text_then_done_on_close() {
        let mut asm = GeminiAssembler::default();
        let first = asm
            .on_event(data(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}}]
            })))
            .unwrap();
        let second = asm
            .on_event(data(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "lo"}]}, "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 2}
            })))
            .unwrap();
        assert_eq!(first, vec![ProviderChunk::TextDelta("Hel".into())]);
        assert_eq!(second, vec![ProviderChunk::TextDelta("lo".into())]);
        assert_eq!(
            asm.on_end(),
            vec![ProviderChunk::Done {
                stop_reason: Some(StopReason::EndTurn),
                usage: Usage {
                    input_tokens: 7,
                    output_tokens: 2
                },
            }]
        );
    }

    #[test]
    fn function_call_gets_generated_id() {
        let mut asm = GeminiAssembler::default();
        let chunks = asm
            .on_event(data(json!({
                "candidates": [{
                    "content": {"parts": [{"functionCall": {"name": "add_numbers", "args": {"a": 2, "b": 3}}}]},
                    "finishReason": "STOP"
                }]
            })))
            .unwrap();
        match &chunks[0] {
            ProviderChunk::ToolCall(call) => {
                assert!(call.id.starts_with("call_"));
                assert_eq!(call.name, "add_numbers");
                assert_eq!(call.arguments, json!({"a": 2, "b": 3}));
            }
            other => panic!("Expected ToolCall, got {other:?}"),
        }
        assert!(matches!(
            asm.on_end()[0],
            ProviderChunk::Done {
                stop_reason: Some(StopReason::ToolUse),
                ..
            }
        ));
    }

    #[test]
    fn truncated_stream_has_no_done() {
        let mut asm = GeminiAssembler::default();
        asm.on_event(data(json!({"candidates": [{"content": {"parts": [{"text": "par"}]}}]})))
            .unwrap();
        assert!(asm.on_end().is_empty());
    }

    #[test]
    fn thought_parts_are_skipped() {
        let mut asm = GeminiAssembler::default();
        let chunks = asm
            .on_event(data(json!({
                "candidates": [{"content": {"parts": [{"text": "thinking...", "thought": true}]}}]
            })))
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn sanitize_drops_unsupported_keys_recursively() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "tags": {"type": "array", "items": {"type": "string", "default": "x"}}
            },
            "required": ["tags"]
        });
        let cleaned = sanitize_schema(&schema);
        assert!(cleaned.get("$schema").is_none());
        assert!(cleaned.get("additionalProperties").is_none());
        assert_eq!(cleaned["required"], json!(["tags"]));
        assert!(cleaned["properties"]["tags"]["items"].get("default").is_none());
    }

    #[test]
    fn request_body_uses_model_role_and_function_response() {
        let provider = GeminiProvider::new(
            "k",
            "https://example.com",
            ModelParams::for_kind(crate::ProviderKind::Gemini),
        )
        .unwrap();
        let turn = ChatTurn {
            system: Some("sys".into()),
            messages: vec![
                Message::user("time?"),
                Message {
                    role: Role::Assistant,
                    content: vec![ContentBlock::ToolUse {
                        id: "call_1".into(),
                        name: "get_time".into(),
                        input: json!({}),
                    }],
                },
                Message {
                    role: Role::Tool,
                    content: vec![ContentBlock::ToolResult {
                        tool_use_id: "call_1".into(),
                        name: "get_time".into(),
                        content: "boom".into(),
                        is_error: true,
                    }],
                },
            ],
            tools: vec![ToolDescriptor::new("get_time", "Current time", json!({"type": "object"}))],
        };
        let body = provider.request_body(&turn);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"]["error"],
            "boom"
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "get_time"
        );
    }
}
