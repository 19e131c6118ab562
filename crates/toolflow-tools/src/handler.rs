//! Adapters that turn plain async closures into a [`CustomToolHandler`].

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;

use serde_json::Value;
use toolflow_types::{CustomToolHandler, ToolDescriptor, ToolError, ToolFuture};

/// A handler backed by one closure that receives the tool name.
pub struct FnHandler<F> {
    f: F,
}

/// Wrap `async |tool_name, arguments| -> Result<Value, E>` as a handler.
///
/// ```ignore
/// let handler = handler_fn(|name, args| async move {
///     match name.as_str() {
///         "add_numbers" => Ok(json!(args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0))),
///         other => Err(format!("no tool named {other}")),
///     }
/// });
/// ```
pub fn handler_fn<F, Fut, E>(f: F) -> FnHandler<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, E>> + Send + 'static,
    E: Display,
{
    FnHandler { f }
}

impl<F, Fut, E> CustomToolHandler for FnHandler<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, E>> + Send + 'static,
    E: Display,
{
    fn call<'a>(&'a self, tool_name: &'a str, arguments: Value) -> ToolFuture<'a, Value> {
        let fut = (self.f)(tool_name.to_string(), arguments);
        Box::pin(async move {
            fut.await.map_err(|e| ToolError::Custom {
                tool: tool_name.to_string(),
                message: e.to_string(),
            })
        })
    }
}

type BoxedTool = Box<dyn Fn(Value) -> ToolFuture<'static, Value> + Send + Sync>;

/// Custom tools registered one closure per name, together with their
/// descriptors.
#[derive(Default)]
pub struct CustomTools {
    descriptors: Vec<ToolDescriptor>,
    handlers: HashMap<String, BoxedTool>,
}

impl CustomTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces the
    /// handler but both descriptors are kept, so the manifest reports the
    /// duplicate.
    pub fn register<F, Fut, E>(mut self, descriptor: ToolDescriptor, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: Display,
    {
        let name = descriptor.name.clone();
        let tool = name.clone();
        let boxed: BoxedTool = Box::new(move |args| -> ToolFuture<'static, Value> {
            let fut = f(args);
            let tool = tool.clone();
            Box::pin(async move {
                fut.await.map_err(|e| ToolError::Custom {
                    tool,
                    message: e.to_string(),
                })
            })
        });
        self.descriptors.push(descriptor);
        self.handlers.insert(name, boxed);
        self
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl CustomToolHandler for CustomTools {
    fn call<'a>(&'a self, tool_name: &'a str, arguments: Value) -> ToolFuture<'a, Value> {
        match self.handlers.get(tool_name) {
            Some(handler) => handler(arguments),
            None => Box::pin(async move {
                Err(ToolError::UnknownTool {
                    name: tool_name.to_string(),
                })
            }),
        }
    }
}
