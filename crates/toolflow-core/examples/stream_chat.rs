//! Stream one turn against the configured provider and MCP service.
//!
//! ```sh
//! ANTHROPIC_API_KEY=... OBSERVEE_API_KEY=... cargo run -p toolflow-core --example stream_chat -- "what's on my calendar?"
//! ```

use std::io::{self, Write};

use anyhow::Result;
use futures_util::StreamExt;
use toolflow_core::{
    ChatRequest, ConfigOverrides, StreamEvent, ToolflowConfig, chat_with_tools_stream,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let message = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let message = if message.is_empty() {
        "Which tools can you use?".to_string()
    } else {
        message
    };

    let config = ToolflowConfig::load(ConfigOverrides::default())
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let mut events = chat_with_tools_stream(ChatRequest::new(message), &config).await?;

    let mut stdout = io::stdout();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Manifest {
                tools,
                used_filtering,
            } => {
                let how = if used_filtering { "filtered" } else { "all" };
                eprintln!("[{} tools, {how}: {}]", tools.len(), tools.join(", "));
            }
            StreamEvent::Content { content } => {
                write!(stdout, "{content}")?;
                stdout.flush()?;
            }
            StreamEvent::Phase { phase } => eprintln!("\n[{}]", phase.as_str()),
            StreamEvent::ToolCall {
                tool_name,
                arguments,
                ..
            } => eprintln!("[call {tool_name} {arguments}]"),
            StreamEvent::ToolResult {
                tool_name,
                result,
                is_error,
                ..
            } => {
                let mark = if is_error { "error" } else { "ok" };
                eprintln!("[{tool_name} {mark}: {result}]");
            }
            StreamEvent::FinalContent { .. } => println!(),
            StreamEvent::Error { message } => anyhow::bail!(message),
        }
    }
    Ok(())
}
