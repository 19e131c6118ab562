//! Name-based dispatch of tool calls to the remote service or the custom handler.

use std::sync::Arc;

use toolflow_types::{
    ConfigError, CustomToolHandler, RemoteTools, ToolCallRequest, ToolError, ToolSource,
};

use crate::manifest::Manifest;
use crate::normalize::normalize_result;
use crate::validate::validate_arguments;

/// The text result of one tool call. Failures are carried as error payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    fn success(call: &ToolCallRequest, content: String) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content,
            is_error: false,
        }
    }

    fn failure(call: &ToolCallRequest, error: &ToolError) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: error.to_string(),
            is_error: true,
        }
    }
}

/// Routes calls by the [`ToolSource`] recorded in the manifest.
#[derive(Clone)]
pub struct ToolDispatcher {
    manifest: Arc<Manifest>,
    remote: Option<Arc<dyn RemoteTools>>,
    custom: Option<Arc<dyn CustomToolHandler>>,
}

impl ToolDispatcher {
    /// Every source named in the manifest must have its executor.
    pub fn new(
        manifest: Manifest,
        remote: Option<Arc<dyn RemoteTools>>,
        custom: Option<Arc<dyn CustomToolHandler>>,
    ) -> Result<Self, ConfigError> {
        if custom.is_none() && manifest.has_source(ToolSource::Custom) {
            return Err(ConfigError::MissingCustomHandler {
                tools: manifest.names_from(ToolSource::Custom).join(", "),
            });
        }
        if remote.is_none() && manifest.has_source(ToolSource::Remote) {
            return Err(ConfigError::MissingKey {
                key: format!(
                    "remote tool service for {}",
                    manifest.names_from(ToolSource::Remote).join(", ")
                ),
            });
        }
        Ok(Self {
            manifest: Arc::new(manifest),
            remote,
            custom,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Run one call. Never fails: errors become the outcome's content.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolOutcome {
        match self.execute(call).await {
            Ok(content) => {
                tracing::debug!(tool = %call.name, id = %call.id, "tool call succeeded");
                ToolOutcome::success(call, content)
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, id = %call.id, "tool call failed: {e}");
                ToolOutcome::failure(call, &e)
            }
        }
    }

    async fn execute(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let unknown = || ToolError::UnknownTool {
            name: call.name.clone(),
        };
        let source = self.manifest.source(&call.name).ok_or_else(unknown)?;
        let descriptor = self.manifest.descriptor(&call.name).ok_or_else(unknown)?;

        validate_arguments(&descriptor.parameters, &call.arguments).map_err(|message| {
            ToolError::InvalidArguments {
                tool: call.name.clone(),
                message,
            }
        })?;

        match source {
            ToolSource::Remote => {
                let remote = self.remote.as_ref().ok_or_else(unknown)?;
                remote.call_tool(&call.name, call.arguments.clone()).await
            }
            ToolSource::Custom => {
                let handler = self.custom.as_ref().ok_or_else(unknown)?;
                let value = handler.call(&call.name, call.arguments.clone()).await?;
                Ok(normalize_result(&value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use serde_json::{Value, json};
    use toolflow_types::{ToolDescriptor, ToolFuture, empty_object_schema};

    struct FakeRemote;

    impl RemoteTools for FakeRemote {
        fn list_tools(&self) -> ToolFuture<'_, Vec<ToolDescriptor>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn call_tool<'a>(&'a self, name: &'a str, arguments: Value) -> ToolFuture<'a, String> {
            Box::pin(async move {
                if arguments["fail"] == true {
                    Err(ToolError::Remote {
                        tool: name.to_string(),
                        message: "service unavailable".into(),
                    })
                } else {
                    Ok(format!("remote {name}"))
                }
            })
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments,
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let add_schema = json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        });
        let manifest = Manifest::builder()
            .remote([ToolDescriptor::new("search", "", empty_object_schema())])
            .custom([ToolDescriptor::new("add_numbers", "", add_schema)])
            .build()
            .unwrap();
        let handler = handler_fn(|_name: String, args: Value| async move {
            match (args["a"].as_i64(), args["b"].as_i64()) {
                (Some(a), Some(b)) => Ok(json!(a + b)),
                _ => Err("only integers are supported"),
            }
        });
        ToolDispatcher::new(manifest, Some(Arc::new(FakeRemote)), Some(Arc::new(handler)))
            .unwrap()
    }

    #[tokio::test]
    async fn custom_result_normalized() {
        let outcome = dispatcher()
            .dispatch(&call("add_numbers", json!({"a": 2, "b": 3})))
            .await;
        assert_eq!(outcome.content, "5");
        assert_eq!(outcome.tool_name, "add_numbers");
        assert_eq!(outcome.call_id, "call_add_numbers");
        assert!(!outcome.is_error);
    }

    #[tokio::test]
    async fn remote_call_and_remote_failure() {
        let d = dispatcher();
        assert_eq!(d.dispatch(&call("search", json!({}))).await.content, "remote search");

        let failed = d.dispatch(&call("search", json!({"fail": true}))).await;
        assert!(failed.is_error);
        assert!(failed.content.contains("service unavailable"));
    }

    #[tokio::test]
    async fn unknown_tool_is_error_payload() {
        let outcome = dispatcher().dispatch(&call("delete_everything", json!({}))).await;
        assert!(outcome.is_error);
        assert_eq!(outcome.content, "Unknown tool: delete_everything");
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_handler() {
        let outcome = dispatcher()
            .dispatch(&call("add_numbers", json!({"a": 2})))
            .await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("missing required property 'b'"));
    }

    #[tokio::test]
    async fn handler_error_is_error_payload() {
        let outcome = dispatcher()
            .dispatch(&call("add_numbers", json!({"a": 2.5, "b": 1})))
            .await;
        assert!(outcome.is_error);
        assert_eq!(
            outcome.content,
            "Custom tool 'add_numbers' failed: only integers are supported"
        );
    }

    #[test]
    fn custom_tools_require_handler() {
        let manifest = Manifest::builder()
            .custom([ToolDescriptor::new("get_time", "", empty_object_schema())])
            .build()
            .unwrap();
        match ToolDispatcher::new(manifest, None, None) {
            Err(ConfigError::MissingCustomHandler { tools }) => assert_eq!(tools, "get_time"),
            Err(other) => panic!("Expected MissingCustomHandler, got {other:?}"),
            Ok(_) => panic!("Expected MissingCustomHandler"),
        }
    }

    #[test]
    fn empty_manifest_needs_no_executors() {
        let dispatcher = ToolDispatcher::new(Manifest::default(), None, None).unwrap();
        assert!(dispatcher.manifest().is_empty());
    }
}
