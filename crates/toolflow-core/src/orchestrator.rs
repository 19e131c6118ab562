//! The streaming orchestration loop: provider rounds interleaved with tool dispatch.

use std::pin::Pin;
use std::sync::Arc;

use futures_core::Stream;
use futures_util::StreamExt;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use toolflow_config::DEFAULT_MAX_ROUNDS;
use toolflow_tools::{ToolDispatcher, ToolOutcome};
use toolflow_types::util::preview;
use toolflow_types::{
    ApiError, ChatTurn, ConfigError, ContentBlock, Message, Phase, Provider, ProviderChunk, Role,
    StreamEvent, ToolCallRequest, ToolflowError, Usage,
};

/// The lazy, single-pass event sequence of one turn.
pub type TurnStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Lifecycle of a turn. `Finished` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Streaming,
    Dispatching,
    Finished,
    Failed,
}

/// Drives one provider through tool-calling rounds until it answers without
/// tool calls.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    system_prompt: Option<String>,
    max_rounds: usize,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, dispatcher: ToolDispatcher) -> Self {
        Self {
            provider,
            dispatcher,
            system_prompt: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Run a turn for `message`.
    ///
    /// Dropping the returned stream abandons the turn: the provider connection
    /// and any in-flight tool calls are dropped with it.
    pub fn run(&self, message: impl Into<String>) -> TurnStream {
        self.run_with_cancel(message, CancellationToken::new())
    }

    /// Run a turn that also ends, with an "Operation cancelled" error, when
    /// `cancel` fires.
    ///
    /// A blank message yields a single configuration error and never reaches
    /// the provider.
    pub fn run_with_cancel(
        &self,
        message: impl Into<String>,
        cancel: CancellationToken,
    ) -> TurnStream {
        let message = message.into();
        let blank = message.trim().is_empty();
        let turn = Turn {
            provider: Arc::clone(&self.provider),
            dispatcher: self.dispatcher.clone(),
            chat: ChatTurn {
                system: self.system_prompt.clone(),
                messages: vec![Message::user(message)],
                tools: self.dispatcher.manifest().descriptors().to_vec(),
            },
            state: TurnState::Idle,
            usage: Usage::default(),
        };
        let max_rounds = self.max_rounds;

        Box::pin(async_stream::stream! {
            let mut turn = turn;
            if blank {
                yield turn.fail(ConfigError::EmptyMessage.into());
                return;
            }
            yield turn.manifest_event();

            for round in 1..=max_rounds {
                yield StreamEvent::Phase {
                    phase: if round == 1 { Phase::InitialResponse } else { Phase::FollowUp },
                };
                turn.transition(TurnState::Streaming);
                tracing::debug!(
                    provider = turn.provider.name(),
                    round,
                    messages = turn.chat.messages.len(),
                    "opening provider stream"
                );

                let opened = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ToolflowError::Cancelled),
                    opened = turn.provider.stream_chat(&turn.chat) => opened.map_err(ToolflowError::Api),
                };
                let mut chunks = match opened {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        yield turn.fail(e);
                        return;
                    }
                };

                let mut text = String::new();
                let mut calls: Vec<ToolCallRequest> = Vec::new();
                let mut completed = false;
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(ToolflowError::Cancelled),
                        next = chunks.next() => Ok(next),
                    };
                    match next {
                        Ok(Some(Ok(ProviderChunk::TextDelta(delta)))) => {
                            text.push_str(&delta);
                            yield StreamEvent::Content { content: delta };
                        }
                        Ok(Some(Ok(ProviderChunk::ToolCall(call)))) => calls.push(call),
                        Ok(Some(Ok(ProviderChunk::Done { stop_reason, usage }))) => {
                            tracing::debug!(?stop_reason, round, "provider round complete");
                            turn.usage.add(&usage);
                            completed = true;
                            break;
                        }
                        Ok(Some(Err(e))) => {
                            yield turn.fail(ToolflowError::Api(e));
                            return;
                        }
                        Ok(None) => break,
                        Err(e) => {
                            yield turn.fail(e);
                            return;
                        }
                    }
                }
                // Release the connection before tools run.
                drop(chunks);

                if !completed {
                    yield turn.fail(ToolflowError::Api(ApiError::Network(
                        "provider stream ended before the response completed".into(),
                    )));
                    return;
                }

                if calls.is_empty() {
                    turn.transition(TurnState::Finished);
                    tracing::info!(
                        rounds = round,
                        input_tokens = turn.usage.input_tokens,
                        output_tokens = turn.usage.output_tokens,
                        "turn finished"
                    );
                    yield StreamEvent::FinalContent { content: text };
                    return;
                }

                turn.record_assistant(text, &calls);
                turn.transition(TurnState::Dispatching);
                yield StreamEvent::Phase { phase: Phase::ToolDispatch };
                for call in &calls {
                    yield StreamEvent::ToolCall {
                        id: call.id.clone(),
                        tool_name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    };
                }

                let dispatched = {
                    let dispatcher = &turn.dispatcher;
                    let all = join_all(calls.iter().map(|call| dispatcher.dispatch(call)));
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        outcomes = all => Some(outcomes),
                    }
                };
                let Some(outcomes) = dispatched else {
                    yield turn.fail(ToolflowError::Cancelled);
                    return;
                };

                for outcome in &outcomes {
                    yield StreamEvent::ToolResult {
                        call_id: outcome.call_id.clone(),
                        tool_name: outcome.tool_name.clone(),
                        result: outcome.content.clone(),
                        is_error: outcome.is_error,
                    };
                }
                turn.record_results(outcomes);
            }

            yield turn.fail(ToolflowError::Other(format!(
                "Exceeded maximum of {max_rounds} provider rounds without a final answer"
            )));
        })
    }
}

/// State owned by one running turn.
struct Turn {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    chat: ChatTurn,
    state: TurnState,
    usage: Usage,
}

impl Turn {
    fn manifest_event(&self) -> StreamEvent {
        let manifest = self.dispatcher.manifest();
        StreamEvent::Manifest {
            tools: manifest.names(),
            used_filtering: manifest.used_filtering(),
        }
    }

    fn transition(&mut self, next: TurnState) {
        tracing::debug!(from = ?self.state, to = ?next, "turn state");
        self.state = next;
    }

    fn fail(&mut self, error: ToolflowError) -> StreamEvent {
        self.transition(TurnState::Failed);
        match &error {
            ToolflowError::Cancelled => tracing::info!("turn cancelled"),
            other => tracing::warn!("turn failed: {other}"),
        }
        StreamEvent::Error {
            message: error.to_string(),
        }
    }

    fn record_assistant(&mut self, text: String, calls: &[ToolCallRequest]) {
        let mut content = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            content.push(ContentBlock::Text { text });
        }
        content.extend(calls.iter().map(|call| ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        }));
        self.chat.messages.push(Message {
            role: Role::Assistant,
            content,
        });
    }

    /// One tool message carrying every result of the round, in request order.
    fn record_results(&mut self, outcomes: Vec<ToolOutcome>) {
        let content = outcomes
            .into_iter()
            .map(|outcome| {
                tracing::debug!(
                    tool = %outcome.tool_name,
                    is_error = outcome.is_error,
                    "tool result: {}",
                    preview(&outcome.content, 200)
                );
                ContentBlock::ToolResult {
                    tool_use_id: outcome.call_id,
                    name: outcome.tool_name,
                    content: outcome.content,
                    is_error: outcome.is_error,
                }
            })
            .collect();
        self.chat.messages.push(Message {
            role: Role::Tool,
            content,
        });
    }
}
