//! Entry points that assemble a turn from configuration.
//!
//! Every configuration problem surfaces here, before the first provider
//! request: an empty message, an unknown provider, a missing API key, custom
//! tools without a handler, duplicate tool names and an unreachable MCP
//! service.

use std::sync::Arc;

use futures_util::StreamExt;
use toolflow_api::{ProviderKind, build_provider};
use toolflow_config::ToolflowConfig;
use toolflow_mcp::McpClient;
use toolflow_tools::{CustomTools, FilterOptions, Manifest, ToolDispatcher, remote_descriptors};
use toolflow_types::{
    ConfigError, CustomToolHandler, RemoteTools, StreamEvent, ToolDescriptor, ToolflowError,
};

use crate::orchestrator::{Orchestrator, TurnStream};

/// One user message and the per-turn choices that go with it.
#[derive(Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    /// Provider name; the configured default when `None`.
    pub provider: Option<String>,
    pub custom_tools: Vec<ToolDescriptor>,
    pub custom_handler: Option<Arc<dyn CustomToolHandler>>,
    /// Overrides the configured filter switch for this turn.
    pub enable_filtering: Option<bool>,
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_custom_tools(
        mut self,
        tools: Vec<ToolDescriptor>,
        handler: Arc<dyn CustomToolHandler>,
    ) -> Self {
        self.custom_tools = tools;
        self.custom_handler = Some(handler);
        self
    }

    /// Use a [`CustomTools`] registry for both descriptors and handler.
    pub fn with_registered_tools(self, tools: CustomTools) -> Self {
        let descriptors = tools.descriptors().to_vec();
        self.with_custom_tools(descriptors, Arc::new(tools))
    }

    pub fn with_filtering(mut self, enabled: bool) -> Self {
        self.enable_filtering = Some(enabled);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Validate the request, connect the collaborators and start the turn.
pub async fn chat_with_tools_stream(
    request: ChatRequest,
    config: &ToolflowConfig,
) -> Result<TurnStream, ToolflowError> {
    if request.message.trim().is_empty() {
        return Err(ConfigError::EmptyMessage.into());
    }
    let kind = match &request.provider {
        Some(name) => name.parse::<ProviderKind>()?,
        None => config.provider,
    };
    let settings = config.provider_settings(kind)?;
    if !request.custom_tools.is_empty() && request.custom_handler.is_none() {
        return Err(missing_handler(&request.custom_tools).into());
    }
    let provider = build_provider(kind, &settings)?;

    let remote: Option<Arc<dyn RemoteTools>> = match &config.observee {
        Some(server) => Some(Arc::new(McpClient::connect(server).await?) as Arc<dyn RemoteTools>),
        None => None,
    };
    let mut filter_settings = config.filter.clone();
    if let Some(enabled) = request.enable_filtering {
        filter_settings.enabled = enabled;
    }
    let filter = filter_settings.options();

    let dispatcher = build_dispatcher(
        remote,
        request.custom_tools,
        request.custom_handler,
        filter.as_ref(),
        &request.message,
    )
    .await?;
    tracing::info!(
        provider = %kind,
        model = %settings.params.model,
        tools = dispatcher.manifest().len(),
        "starting turn"
    );

    let orchestrator = Orchestrator::new(provider, dispatcher)
        .with_system_prompt(request.system_prompt.or_else(|| config.system_prompt.clone()))
        .with_max_rounds(config.max_rounds);
    Ok(orchestrator.run(request.message))
}

/// Collect remote tools (narrowed when `filter` is set) and custom tools
/// (never narrowed) into a dispatcher.
pub async fn build_dispatcher(
    remote: Option<Arc<dyn RemoteTools>>,
    custom_tools: Vec<ToolDescriptor>,
    custom_handler: Option<Arc<dyn CustomToolHandler>>,
    filter: Option<&FilterOptions>,
    query: &str,
) -> Result<ToolDispatcher, ToolflowError> {
    if !custom_tools.is_empty() && custom_handler.is_none() {
        return Err(missing_handler(&custom_tools).into());
    }

    let remote_tools = match &remote {
        Some(service) => remote_descriptors(service.as_ref(), filter, query)
            .await
            .map_err(|e| ToolflowError::Mcp(e.to_string()))?,
        None => Vec::new(),
    };

    let manifest = Manifest::builder()
        .remote(remote_tools)
        .custom(custom_tools)
        .filtered(remote.is_some() && filter.is_some())
        .build()?;
    Ok(ToolDispatcher::new(manifest, remote, custom_handler)?)
}

fn missing_handler(tools: &[ToolDescriptor]) -> ConfigError {
    ConfigError::MissingCustomHandler {
        tools: tools
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// A drained turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOutcome {
    pub content: String,
    pub tools_offered: Vec<String>,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// One dispatched call with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result: String,
    pub is_error: bool,
}

/// Run a turn to completion and return the final answer with every tool
/// call made on the way. A terminal error event becomes `Err`.
pub async fn chat_with_tools(
    request: ChatRequest,
    config: &ToolflowConfig,
) -> Result<ChatOutcome, ToolflowError> {
    let stream = chat_with_tools_stream(request, config).await?;
    collect_turn(stream).await
}

/// Drain a turn stream into a [`ChatOutcome`].
pub async fn collect_turn(mut stream: TurnStream) -> Result<ChatOutcome, ToolflowError> {
    let mut outcome = ChatOutcome::default();
    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Manifest { tools, .. } => outcome.tools_offered = tools,
            StreamEvent::ToolCall {
                id,
                tool_name,
                arguments,
            } => outcome.tool_calls.push(ToolCallRecord {
                id,
                tool_name,
                arguments,
                result: String::new(),
                is_error: false,
            }),
            StreamEvent::ToolResult {
                call_id,
                result,
                is_error,
                ..
            } => {
                if let Some(record) = outcome.tool_calls.iter_mut().find(|r| r.id == call_id) {
                    record.result = result;
                    record.is_error = is_error;
                }
            }
            StreamEvent::FinalContent { content } => {
                outcome.content = content;
                return Ok(outcome);
            }
            StreamEvent::Error { message } => return Err(ToolflowError::Other(message)),
            StreamEvent::Content { .. } | StreamEvent::Phase { .. } => {}
        }
    }
    Err(ToolflowError::Other(
        "turn ended without a final answer".into(),
    ))
}
