//! A turn that only uses locally registered tools.
//!
//! ```sh
//! OPENAI_API_KEY=... cargo run -p toolflow-core --example custom_tools -- openai
//! ```

use std::io;

use anyhow::Result;
use serde_json::{Value, json};
use toolflow_core::{ChatRequest, ConfigOverrides, ToolflowConfig, chat_with_tools};
use toolflow_tools::CustomTools;
use toolflow_types::{ToolDescriptor, empty_object_schema};

fn two_numbers(a: &str, b: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "number", "description": a},
            "b": {"type": "number", "description": b}
        },
        "required": ["a", "b"]
    })
}

fn operands(args: &Value) -> Result<(f64, f64), String> {
    match (args["a"].as_f64(), args["b"].as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err("both 'a' and 'b' must be numbers".to_string()),
    }
}

/// Whole results render without a trailing `.0`.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn calculator() -> CustomTools {
    CustomTools::new()
        .register(
            ToolDescriptor::new(
                "add_numbers",
                "Add two numbers together",
                two_numbers("First number", "Second number"),
            ),
            |args: Value| async move { operands(&args).map(|(a, b)| number(a + b)) },
        )
        .register(
            ToolDescriptor::new(
                "multiply_numbers",
                "Multiply two numbers",
                two_numbers("First factor", "Second factor"),
            ),
            |args: Value| async move { operands(&args).map(|(a, b)| number(a * b)) },
        )
        .register(
            ToolDescriptor::new("get_time", "Get the current UTC time", empty_object_schema()),
            |_args: Value| async move {
                Ok::<_, String>(json!({
                    "utc": chrono::Utc::now().to_rfc3339(),
                    "unix": chrono::Utc::now().timestamp(),
                }))
            },
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let provider = std::env::args().nth(1);
    let config = ToolflowConfig::load(ConfigOverrides {
        provider: provider.clone(),
        ..Default::default()
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut request = ChatRequest::new("What is 12.5 times 4, plus 7? Also, what time is it?")
        .with_registered_tools(calculator());
    if let Some(provider) = provider {
        request = request.with_provider(provider);
    }

    let outcome = chat_with_tools(request, &config).await?;
    for call in &outcome.tool_calls {
        eprintln!("{} {} -> {}", call.tool_name, call.arguments, call.result);
    }
    println!("{}", outcome.content);
    Ok(())
}
