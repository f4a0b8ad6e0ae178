//! Tool registry and dispatch.
//!
//! A tool is a named capability the model may invoke. The registry keeps
//! the descriptor used for advertising the tool alongside the handler that
//! runs it, and `dispatch` is the one place where every failure mode of a
//! tool call is folded into a [`ToolResult`].

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ToolError;
use crate::provider::ToolSchema;

/// A registered tool's descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique key in the registry (e.g., "run_command")
    pub name: String,

    /// What the tool does (sent to the model)
    pub description: String,

    /// JSON Schema of the arguments. Advertised only, never validated here.
    pub parameters: serde_json::Value,

    /// Whether the operator must approve each invocation
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            requires_confirmation: false,
        }
    }

    pub fn with_confirmation(mut self, required: bool) -> Self {
        self.requires_confirmation = required;
        self
    }

    /// The model-facing schema for this tool.
    pub fn to_schema(&self) -> ToolSchema {
        ToolSchema::function(&self.name, &self.description, self.parameters.clone())
    }
}

/// The outcome of a tool invocation.
///
/// `output` is authoritative when `success` is true, `error` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    #[serde(default)]
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// The text stored in the `tool` message for this result.
    pub fn to_message_content(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }
}

/// The callable behind a registered tool.
///
/// Handlers are shared between conversations and must be reentrant.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;
}

struct Entry {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Name → (descriptor, handler) lookup table.
///
/// Set up once at startup, then read-only. Listing keeps registration order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A second registration under the same name replaces
    /// the first in place.
    pub fn register(&mut self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        match self.index.get(&tool.name) {
            Some(&pos) => self.entries[pos] = Entry { tool, handler },
            None => {
                self.index.insert(tool.name.clone(), self.entries.len());
                self.entries.push(Entry { tool, handler });
            }
        }
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.index
            .get(name)
            .map(|&pos| Arc::clone(&self.entries[pos].handler))
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&pos| &self.entries[pos].tool)
    }

    /// All registered tool descriptors, in registration order.
    pub fn list_tools(&self) -> Vec<&Tool> {
        self.entries.iter().map(|e| &e.tool).collect()
    }

    /// The payload advertised to the model, one entry per tool.
    pub fn schemas_for_model(&self) -> Vec<ToolSchema> {
        self.entries.iter().map(|e| e.tool.to_schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke a tool by name. Never fails: unknown tools, handler errors
    /// and handler panics all come back as a failed [`ToolResult`].
    pub async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        let Some(handler) = self.handler(name) else {
            warn!(tool = name, "Model requested an unknown tool");
            return ToolResult::failure(ToolError::NotFound(name.to_string()).to_string());
        };

        match AssertUnwindSafe(handler.call(arguments)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "Tool call failed");
                ToolResult::failure(e.to_string())
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(tool = name, reason = %reason, "Tool handler panicked");
                ToolResult::failure(ToolError::Panicked(reason).to_string())
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoHandler {
        prefix: &'static str,
    }

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("");
            Ok(ToolResult::ok(format!("{}{}", self.prefix, text)))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ToolHandler for FailingHandler {
        async fn call(&self, _arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            Err(ToolError::InvalidArguments("missing 'text'".into()))
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl ToolHandler for PanickingHandler {
        async fn call(&self, _arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            panic!("boom");
        }
    }

    fn echo_tool() -> Tool {
        Tool::new(
            "echo",
            "Echoes back the input",
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        )
    }

    #[tokio::test]
    async fn register_and_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool(), Arc::new(EchoHandler { prefix: "" }));

        let result = registry
            .dispatch("echo", serde_json::json!({"text": "hello"}))
            .await;
        assert!(result.success);
        assert_eq!(result.output, "hello");
        assert_eq!(result.to_message_content(), "hello");
    }

    #[tokio::test]
    async fn second_registration_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool(), Arc::new(EchoHandler { prefix: "first:" }));
        registry.register(
            Tool::new("other", "Another tool", serde_json::json!({"type": "object"})),
            Arc::new(EchoHandler { prefix: "" }),
        );
        registry.register(echo_tool(), Arc::new(EchoHandler { prefix: "second:" }));

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.list_tools().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["echo", "other"]);

        let result = registry.dispatch("echo", serde_json::json!({"text": "x"})).await;
        assert_eq!(result.output, "second:x");
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failed_result() {
        let registry = ToolRegistry::new();
        let result = registry.dispatch("teleport", serde_json::json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: teleport"));
        assert_eq!(result.to_message_content(), "Error: Unknown tool: teleport");
    }

    #[tokio::test]
    async fn handler_error_is_captured() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool(), Arc::new(FailingHandler));

        let result = registry.dispatch("echo", serde_json::json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("missing 'text'"));
    }

    #[tokio::test]
    async fn handler_panic_is_captured() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool(), Arc::new(PanickingHandler));

        let result = registry.dispatch("echo", serde_json::json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("boom"));
    }

    #[test]
    fn schemas_are_stable() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool(), Arc::new(EchoHandler { prefix: "" }));

        let first = registry.schemas_for_model();
        let second = registry.schemas_for_model();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].function.name, "echo");
        assert_eq!(first[0].kind, "function");
    }
}
