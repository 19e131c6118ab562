//! End-to-end tests for the orchestration loop.
//!
//! A scripted provider plays back one chunk sequence per round and records
//! every turn it is asked to continue, so tests can check both the events the
//! caller sees and what was sent back to the model.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{StreamExt, stream};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use toolflow_config::SettingsFile;
use toolflow_core::{
    ChatRequest, ConfigOverrides, Orchestrator, Phase, StreamEvent, ToolflowConfig, ToolflowError,
    build_dispatcher, chat_with_tools, chat_with_tools_stream,
};
use toolflow_tools::{CustomTools, FilterOptions, Manifest, ToolDispatcher};
use toolflow_types::{
    ApiError, ChatTurn, ChunkStream, ConfigError, ContentBlock, Provider, ProviderChunk,
    RemoteTools, Role, StopReason, ToolCallRequest, ToolDescriptor, ToolFuture, Usage,
    empty_object_schema,
};

// ---------------------------------------------------------------------------
// ScriptedProvider
// ---------------------------------------------------------------------------

enum Step {
    Chunk(ProviderChunk),
    Fail(ApiError),
    /// Never yields again, like a stalled connection.
    Hang,
}

/// Sets its flag when the provider stream holding it is dropped.
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct ScriptedProvider {
    rounds: Mutex<VecDeque<Vec<Step>>>,
    seen: Mutex<Vec<ChatTurn>>,
    released: Arc<AtomicBool>,
}

impl ScriptedProvider {
    fn new(rounds: Vec<Vec<Step>>) -> Arc<Self> {
        Arc::new(Self {
            rounds: Mutex::new(rounds.into()),
            seen: Mutex::new(Vec::new()),
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    fn seen(&self) -> Vec<ChatTurn> {
        self.seen.lock().unwrap().clone()
    }

    fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Provider for ScriptedProvider {
    fn stream_chat<'a>(
        &'a self,
        turn: &'a ChatTurn,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkStream, ApiError>> + Send + 'a>> {
        self.seen.lock().unwrap().push(turn.clone());
        let round = self.rounds.lock().unwrap().pop_front();
        let guard = ReleaseGuard(Arc::clone(&self.released));

        Box::pin(async move {
            let steps = round.ok_or_else(|| ApiError::Server {
                status: 503,
                message: "no scripted round left".into(),
            })?;
            let chunks = stream::unfold((steps.into_iter(), guard), |(mut steps, guard)| async move {
                match steps.next()? {
                    Step::Chunk(chunk) => Some((Ok(chunk), (steps, guard))),
                    Step::Fail(e) => Some((Err(e), (steps, guard))),
                    Step::Hang => {
                        std::future::pending::<()>().await;
                        None
                    }
                }
            });
            Ok(Box::pin(chunks) as ChunkStream)
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// Step builders
// ---------------------------------------------------------------------------

fn text(s: &str) -> Step {
    Step::Chunk(ProviderChunk::TextDelta(s.to_string()))
}

fn call(id: &str, name: &str, arguments: Value) -> Step {
    Step::Chunk(ProviderChunk::ToolCall(ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }))
}

fn done(stop_reason: StopReason) -> Step {
    Step::Chunk(ProviderChunk::Done {
        stop_reason: Some(stop_reason),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    })
}

// ---------------------------------------------------------------------------
// Tool fixtures
// ---------------------------------------------------------------------------

fn add_numbers_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "add_numbers",
        "Add two numbers together",
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "description": "First number"},
                "b": {"type": "number", "description": "Second number"}
            },
            "required": ["a", "b"]
        }),
    )
}

fn calculator() -> CustomTools {
    CustomTools::new()
        .register(add_numbers_descriptor(), |args: Value| async move {
            match (args["a"].as_i64(), args["b"].as_i64()) {
                (Some(a), Some(b)) => Ok(json!(a + b)),
                _ => Err("add_numbers only handles integers".to_string()),
            }
        })
        .register(
            ToolDescriptor::new("get_time", "Current time", empty_object_schema()),
            |_args: Value| async move { Ok::<_, String>(json!("12:00 UTC")) },
        )
}

fn dispatcher_for(tools: CustomTools) -> ToolDispatcher {
    let manifest = Manifest::builder()
        .custom(tools.descriptors().to_vec())
        .build()
        .unwrap();
    ToolDispatcher::new(manifest, None, Some(Arc::new(tools))).unwrap()
}

fn orchestrator(provider: &Arc<ScriptedProvider>, tools: CustomTools) -> Orchestrator {
    Orchestrator::new(provider.clone(), dispatcher_for(tools))
}

async fn run_to_end(orchestrator: &Orchestrator, message: &str) -> Vec<StreamEvent> {
    tokio::time::timeout(Duration::from_secs(5), orchestrator.run(message).collect::<Vec<_>>())
        .await
        .expect("turn should finish")
}

fn assert_single_terminal_last(events: &[StreamEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "expected exactly one terminal event in {events:?}");
    assert!(events.last().unwrap().is_terminal());
}

fn tool_results(events: &[StreamEvent]) -> Vec<(String, String, String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolResult {
                call_id,
                tool_name,
                result,
                is_error,
            } => Some((call_id.clone(), tool_name.clone(), result.clone(), *is_error)),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Turn shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_message_fails_without_calling_provider() {
    let provider = ScriptedProvider::new(vec![vec![text("unused"), done(StopReason::EndTurn)]]);
    let events = run_to_end(&orchestrator(&provider, calculator()), "  \n ").await;

    assert_eq!(
        events,
        vec![StreamEvent::Error {
            message: "Configuration error: Message must not be empty".into()
        }]
    );
    assert!(provider.seen().is_empty());
}

#[tokio::test]
async fn text_only_turn_ends_with_final_content() {
    let provider = ScriptedProvider::new(vec![vec![
        text("Hello"),
        text(" world"),
        done(StopReason::EndTurn),
    ]]);
    let events = run_to_end(&orchestrator(&provider, calculator()), "hi").await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Manifest {
                tools: vec!["add_numbers".into(), "get_time".into()],
                used_filtering: false,
            },
            StreamEvent::Phase {
                phase: Phase::InitialResponse
            },
            StreamEvent::Content {
                content: "Hello".into()
            },
            StreamEvent::Content {
                content: " world".into()
            },
            StreamEvent::FinalContent {
                content: "Hello world".into()
            },
        ]
    );
    assert_single_terminal_last(&events);

    let seen = provider.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].tools.len(), 2);
    assert_eq!(seen[0].messages[0].text(), "hi");
}

#[tokio::test]
async fn add_numbers_result_is_five() {
    let provider = ScriptedProvider::new(vec![
        vec![
            text("Let me add those."),
            call("call_1", "add_numbers", json!({"a": 2, "b": 3})),
            done(StopReason::ToolUse),
        ],
        vec![text("2 + 3 = 5"), done(StopReason::EndTurn)],
    ]);
    let events = run_to_end(&orchestrator(&provider, calculator()), "add 2 and 3").await;

    assert_eq!(
        tool_results(&events),
        vec![("call_1".into(), "add_numbers".into(), "5".into(), false)]
    );
    assert_eq!(
        events.last(),
        Some(&StreamEvent::FinalContent {
            content: "2 + 3 = 5".into()
        })
    );
    assert_single_terminal_last(&events);

    let phases: Vec<Phase> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Phase { phase } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![Phase::InitialResponse, Phase::ToolDispatch, Phase::FollowUp]
    );

    let dispatch_at = events
        .iter()
        .position(|e| *e == StreamEvent::Phase { phase: Phase::ToolDispatch })
        .unwrap();
    let call_at = events
        .iter()
        .position(|e| matches!(e, StreamEvent::ToolCall { .. }))
        .unwrap();
    assert!(dispatch_at < call_at);

    // The follow-up request carries the assistant tool use and its result.
    let seen = provider.seen();
    assert_eq!(seen.len(), 2);
    let follow_up = &seen[1].messages;
    assert_eq!(follow_up.len(), 3);
    assert_eq!(follow_up[1].role, Role::Assistant);
    assert_eq!(follow_up[1].tool_uses().count(), 1);
    assert_eq!(follow_up[2].role, Role::Tool);
    assert_eq!(
        follow_up[2].content,
        vec![ContentBlock::ToolResult {
            tool_use_id: "call_1".into(),
            name: "add_numbers".into(),
            content: "5".into(),
            is_error: false,
        }]
    );
}

#[tokio::test]
async fn round_calls_run_together_and_results_keep_request_order() {
    // Each tool waits until both are running, so sequential dispatch would
    // never finish. The first one then finishes last.
    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let slow_barrier = Arc::clone(&barrier);
    let fast_barrier = Arc::clone(&barrier);
    let tools = CustomTools::new()
        .register(
            ToolDescriptor::new("slow", "", empty_object_schema()),
            move |_args: Value| {
                let barrier = Arc::clone(&slow_barrier);
                async move {
                    barrier.wait().await;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, String>(json!("slow done"))
                }
            },
        )
        .register(
            ToolDescriptor::new("fast", "", empty_object_schema()),
            move |_args: Value| {
                let barrier = Arc::clone(&fast_barrier);
                async move {
                    barrier.wait().await;
                    Ok::<_, String>(json!("fast done"))
                }
            },
        );

    let provider = ScriptedProvider::new(vec![
        vec![
            call("c1", "slow", json!({})),
            call("c2", "fast", json!({})),
            done(StopReason::ToolUse),
        ],
        vec![text("both done"), done(StopReason::EndTurn)],
    ]);
    let events = run_to_end(&orchestrator(&provider, tools), "run both").await;

    let results = tool_results(&events);
    assert_eq!(results[0].0, "c1");
    assert_eq!(results[0].2, "slow done");
    assert_eq!(results[1].0, "c2");
    assert_eq!(results[1].2, "fast done");

    let seen = provider.seen();
    let ids: Vec<&str> = seen[1]
        .messages
        .last()
        .unwrap()
        .content
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);
}

// ---------------------------------------------------------------------------
// Recoverable tool failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_tool_is_reported_and_turn_continues() {
    let provider = ScriptedProvider::new(vec![
        vec![call("c1", "launch_rocket", json!({})), done(StopReason::ToolUse)],
        vec![text("I can't do that."), done(StopReason::EndTurn)],
    ]);
    let events = run_to_end(&orchestrator(&provider, calculator()), "launch").await;

    assert_eq!(
        tool_results(&events),
        vec![(
            "c1".into(),
            "launch_rocket".into(),
            "Unknown tool: launch_rocket".into(),
            true
        )]
    );
    assert!(matches!(events.last(), Some(StreamEvent::FinalContent { .. })));
    assert_single_terminal_last(&events);

    let seen = provider.seen();
    assert!(matches!(
        &seen[1].messages[2].content[0],
        ContentBlock::ToolResult { is_error: true, .. }
    ));
}

#[tokio::test]
async fn handler_error_and_invalid_arguments_are_payloads() {
    let provider = ScriptedProvider::new(vec![
        vec![
            call("c1", "add_numbers", json!({"a": 1.5, "b": 2})),
            call("c2", "add_numbers", json!({"a": 1})),
            done(StopReason::ToolUse),
        ],
        vec![text("done"), done(StopReason::EndTurn)],
    ]);
    let events = run_to_end(&orchestrator(&provider, calculator()), "add").await;

    let results = tool_results(&events);
    assert_eq!(results.len(), 2);
    assert!(results[0].3);
    assert_eq!(
        results[0].2,
        "Custom tool 'add_numbers' failed: add_numbers only handles integers"
    );
    assert!(results[1].3);
    assert!(results[1].2.contains("missing required property 'b'"));
    assert_single_terminal_last(&events);
}

// ---------------------------------------------------------------------------
// Fatal failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failure_mid_stream_is_one_terminal_error() {
    let provider = ScriptedProvider::new(vec![vec![
        text("partial"),
        Step::Fail(ApiError::Network("connection reset".into())),
        text("never seen"),
    ]]);
    let events = run_to_end(&orchestrator(&provider, calculator()), "hi").await;

    assert_single_terminal_last(&events);
    assert_eq!(
        events.last(),
        Some(&StreamEvent::Error {
            message: "Transport error: Network error: connection reset".into()
        })
    );
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::FinalContent { .. })));
    assert_eq!(provider.seen().len(), 1);
}

#[tokio::test]
async fn open_failure_is_terminal_error() {
    let provider = ScriptedProvider::new(Vec::new());
    let events = run_to_end(&orchestrator(&provider, calculator()), "hi").await;

    assert_single_terminal_last(&events);
    match events.last() {
        Some(StreamEvent::Error { message }) => assert!(message.contains("503")),
        other => panic!("Expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_ending_without_done_is_error() {
    let provider = ScriptedProvider::new(vec![vec![text("cut off")]]);
    let events = run_to_end(&orchestrator(&provider, calculator()), "hi").await;

    assert_single_terminal_last(&events);
    match events.last() {
        Some(StreamEvent::Error { message }) => {
            assert!(message.contains("ended before the response completed"))
        }
        other => panic!("Expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn round_limit_ends_turn() {
    let tool_round = || {
        vec![
            call("c", "get_time", json!({})),
            done(StopReason::ToolUse),
        ]
    };
    let provider = ScriptedProvider::new(vec![tool_round(), tool_round(), tool_round()]);
    let orchestrator = orchestrator(&provider, calculator()).with_max_rounds(2);
    let events = run_to_end(&orchestrator, "loop").await;

    assert_single_terminal_last(&events);
    match events.last() {
        Some(StreamEvent::Error { message }) => assert!(message.contains("maximum of 2")),
        other => panic!("Expected Error, got {other:?}"),
    }
    assert_eq!(provider.seen().len(), 2);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_token_ends_stalled_stream() {
    let provider = ScriptedProvider::new(vec![vec![text("thinking"), Step::Hang]]);
    let cancel = CancellationToken::new();
    let mut events = orchestrator(&provider, calculator()).run_with_cancel("hi", cancel.clone());

    loop {
        match events.next().await {
            Some(StreamEvent::Content { .. }) => break,
            Some(_) => continue,
            None => panic!("stream ended before content"),
        }
    }
    cancel.cancel();

    let rest: Vec<_> = tokio::time::timeout(Duration::from_secs(5), events.collect::<Vec<_>>())
        .await
        .expect("cancellation should end the stream");
    assert_eq!(
        rest,
        vec![StreamEvent::Error {
            message: "Operation cancelled".into()
        }]
    );
    assert!(provider.released());
}

#[tokio::test]
async fn dropping_consumer_releases_provider_stream() {
    let provider = ScriptedProvider::new(vec![vec![text("streaming"), Step::Hang]]);
    let mut events = orchestrator(&provider, calculator()).run("hi");

    loop {
        match events.next().await {
            Some(StreamEvent::Content { .. }) => break,
            Some(_) => continue,
            None => panic!("stream ended before content"),
        }
    }
    assert!(!provider.released());
    drop(events);
    assert!(provider.released());
}

#[tokio::test]
async fn cancel_during_tool_dispatch() {
    let tools = CustomTools::new().register(
        ToolDescriptor::new("sleepy", "", empty_object_schema()),
        |_args: Value| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, String>(json!("woke"))
        },
    );
    let provider = ScriptedProvider::new(vec![vec![
        call("c1", "sleepy", json!({})),
        done(StopReason::ToolUse),
    ]]);
    let cancel = CancellationToken::new();
    let mut events = orchestrator(&provider, tools).run_with_cancel("nap", cancel.clone());

    loop {
        match events.next().await {
            Some(StreamEvent::ToolCall { .. }) => break,
            Some(_) => continue,
            None => panic!("stream ended before tool call"),
        }
    }
    cancel.cancel();

    let rest: Vec<_> = tokio::time::timeout(Duration::from_secs(5), events.collect::<Vec<_>>())
        .await
        .expect("cancellation should end the stream");
    assert_eq!(
        rest,
        vec![StreamEvent::Error {
            message: "Operation cancelled".into()
        }]
    );
}

// ---------------------------------------------------------------------------
// Manifest assembly
// ---------------------------------------------------------------------------

struct Catalog(Vec<ToolDescriptor>);

impl RemoteTools for Catalog {
    fn list_tools(&self) -> ToolFuture<'_, Vec<ToolDescriptor>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }

    fn call_tool<'a>(&'a self, name: &'a str, _arguments: Value) -> ToolFuture<'a, String> {
        Box::pin(async move { Ok(format!("{name} ok")) })
    }
}

fn catalog() -> Arc<dyn RemoteTools> {
    Arc::new(Catalog(
        [
            ("weather__forecast", "Get the weather forecast for a city"),
            ("gmail__send_email", "Send an email message"),
            ("gmail__search_emails", "Search the mailbox"),
            ("slack__post_message", "Post a message to a channel"),
            ("youtube__get_transcript", "Fetch a video transcript"),
        ]
        .into_iter()
        .map(|(n, d)| ToolDescriptor::new(n, d, empty_object_schema()))
        .collect(),
    ))
}

#[tokio::test]
async fn filtering_never_drops_custom_tools() {
    for query in ["what is the weather forecast in Paris", "xyzzy plugh"] {
        let tools = calculator();
        let dispatcher = build_dispatcher(
            Some(catalog()),
            tools.descriptors().to_vec(),
            Some(Arc::new(tools)),
            Some(&FilterOptions::default()),
            query,
        )
        .await
        .unwrap();

        let names = dispatcher.manifest().names();
        assert!(names.contains(&"add_numbers".to_string()), "{query}: {names:?}");
        assert!(names.contains(&"get_time".to_string()), "{query}: {names:?}");
        assert!(!names.contains(&"gmail__send_email".to_string()));
        assert!(dispatcher.manifest().used_filtering());
    }
}

#[tokio::test]
async fn unfiltered_manifest_offers_every_remote_tool() {
    let dispatcher = build_dispatcher(Some(catalog()), Vec::new(), None, None, "anything")
        .await
        .unwrap();
    assert_eq!(dispatcher.manifest().len(), 5);
    assert!(!dispatcher.manifest().used_filtering());
}

#[tokio::test]
async fn duplicate_remote_and_custom_name_is_config_error() {
    let tools = CustomTools::new().register(
        ToolDescriptor::new("weather__forecast", "", empty_object_schema()),
        |_args: Value| async move { Ok::<_, String>(json!("sunny")) },
    );
    let result = build_dispatcher(
        Some(catalog()),
        tools.descriptors().to_vec(),
        Some(Arc::new(tools)),
        None,
        "weather",
    )
    .await;
    assert!(matches!(
        result,
        Err(ToolflowError::Config(ConfigError::DuplicateTool { .. }))
    ));
}

// ---------------------------------------------------------------------------
// Configuration failures happen before streaming
// ---------------------------------------------------------------------------

fn config(overrides: ConfigOverrides, toml_str: &str) -> ToolflowConfig {
    let settings: SettingsFile = toml::from_str(toml_str).unwrap();
    ToolflowConfig::resolve(overrides, settings, |_| None).unwrap()
}

fn keyed_config() -> ToolflowConfig {
    config(
        ConfigOverrides {
            api_key: Some("test-key".into()),
            ..Default::default()
        },
        "",
    )
}

async fn config_error(request: ChatRequest, config: &ToolflowConfig) -> ConfigError {
    match chat_with_tools_stream(request, config).await {
        Err(ToolflowError::Config(e)) => e,
        Err(other) => panic!("Expected configuration error, got {other:?}"),
        Ok(_) => panic!("Expected configuration error, got a stream"),
    }
}

#[tokio::test]
async fn empty_message_rejected() {
    let err = config_error(ChatRequest::new("   "), &keyed_config()).await;
    assert!(matches!(err, ConfigError::EmptyMessage));
}

#[tokio::test]
async fn unknown_provider_rejected() {
    let err = config_error(ChatRequest::new("hi").with_provider("cohere"), &keyed_config()).await;
    assert!(matches!(err, ConfigError::UnknownProvider { .. }));
}

#[tokio::test]
async fn missing_credential_rejected() {
    let err = config_error(
        ChatRequest::new("hi").with_provider("openai"),
        &keyed_config(),
    )
    .await;
    match err {
        ConfigError::MissingKey { key } => assert!(key.contains("OPENAI_API_KEY")),
        other => panic!("Expected MissingKey, got {other:?}"),
    }
}

#[tokio::test]
async fn custom_tools_without_handler_rejected() {
    let request = ChatRequest {
        custom_tools: vec![add_numbers_descriptor()],
        ..ChatRequest::new("add 2 and 3")
    };
    let err = config_error(request, &keyed_config()).await;
    match err {
        ConfigError::MissingCustomHandler { tools } => assert_eq!(tools, "add_numbers"),
        other => panic!("Expected MissingCustomHandler, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Full stack over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gemini_turn_with_custom_tool_over_http() {
    use httptest::{Expectation, Server, cycle, matchers::*, responders::*};

    let call_round = "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"functionCall\":{\"name\":\"add_numbers\",\"args\":{\"a\":2,\"b\":3}}}]},\"finishReason\":\"STOP\"}]}\n\n";
    let answer_round = "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"The sum is 5.\"}]},\"finishReason\":\"STOP\"}]}\n\n";

    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::headers(contains(("x-goog-api-key", "gem-key"))),
        ])
        .times(2)
        .respond_with(cycle![
            status_code(200).body(call_round),
            status_code(200).body(answer_round),
        ]),
    );

    let config = config(
        ConfigOverrides {
            provider: Some("gemini".into()),
            api_key: Some("gem-key".into()),
            ..Default::default()
        },
        &format!("[provider.gemini]\nbase_url = \"{}\"\n", server.url_str("")),
    );
    let outcome = chat_with_tools(
        ChatRequest::new("add 2 and 3").with_registered_tools(calculator()),
        &config,
    )
    .await
    .unwrap();

    assert_eq!(outcome.content, "The sum is 5.");
    assert_eq!(outcome.tools_offered, vec!["add_numbers", "get_time"]);
    assert_eq!(outcome.tool_calls.len(), 1);
    assert_eq!(outcome.tool_calls[0].tool_name, "add_numbers");
    assert_eq!(outcome.tool_calls[0].arguments, json!({"a": 2, "b": 3}));
    assert_eq!(outcome.tool_calls[0].result, "5");
    assert!(!outcome.tool_calls[0].is_error);
}
