//! Tool system.
//!
//! Capabilities implement the `Tool` trait and are registered with
//! `ToolRegistry`. The registry owns dispatch: it validates arguments
//! against the declared parameter schema at the boundary, and folds
//! unknown tools and execution failures into error results so the loop
//! can surface them to the model instead of failing the run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tool definition for the LLM (OpenAI function-descriptor shape).
/// This is data, not behavior; it is sent verbatim on every LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema for the argument object
    pub parameters: Value,
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            is_error: true,
        }
    }
}

/// Context passed to tools during execution
#[derive(Clone, Default)]
pub struct ToolContext {
    pub cancellation: CancellationToken,
}

impl ToolContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// An invocable capability registered under a tool name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used for dispatch)
    fn name(&self) -> &str;

    /// Declarative definition consumed by the LLM
    fn definition(&self) -> ToolDefinition;

    /// Terminal tools end the run as `completed` on success.
    fn terminal(&self) -> bool {
        false
    }

    /// Execute the tool with validated arguments
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// Registry of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// All tool definitions, for the LLM request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Whether the named tool ends the run on successful execution
    pub fn is_terminal(&self, name: &str) -> bool {
        self.tools.get(name).map(|t| t.terminal()).unwrap_or(false)
    }

    /// Execute a tool by name.
    ///
    /// Unknown tools and schema violations come back as error results,
    /// never as panics or run-fatal errors.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return ToolResult::error(format!("Unknown tool: {}", name));
        };
        if let Err(msg) = validate_required(&tool.definition(), &args) {
            tracing::warn!(tool = name, error = %msg, "argument validation failed");
            return ToolResult::error(msg);
        }
        tool.execute(args, ctx).await
    }
}

/// Check the argument object against the schema's `required` list.
/// Per-field typing is left to each tool's serde parse.
fn validate_required(definition: &ToolDefinition, args: &Value) -> Result<(), String> {
    let Some(required) = definition.parameters.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    if required.is_empty() {
        return Ok(());
    }
    let Some(obj) = args.as_object() else {
        return Err(format!(
            "Invalid arguments for {}: expected an object",
            definition.name
        ));
    };
    for key in required.iter().filter_map(|k| k.as_str()) {
        if !obj.contains_key(key) {
            return Err(format!(
                "Invalid arguments for {}: missing required parameter '{}'",
                definition.name, key
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echoes the text argument".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" }
                    },
                    "required": ["text"]
                }),
            }
        }

        async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
            match args.get("text").and_then(|t| t.as_str()) {
                Some(text) => ToolResult::success(text),
                None => ToolResult::error("text must be a string"),
            }
        }
    }

    struct FinishTool;

    #[async_trait]
    impl Tool for FinishTool {
        fn name(&self) -> &str {
            "finish"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "finish".to_string(),
                description: "Ends the run".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            }
        }

        fn terminal(&self) -> bool {
            true
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::success("done")
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(FinishTool);
        registry
    }

    #[tokio::test]
    async fn test_execute_known_tool() {
        let registry = registry();
        let ctx = ToolContext::default();
        let result = registry
            .execute("echo", json!({"text": "hello"}), &ctx)
            .await;
        assert!(!result.is_error);
        assert_eq!(result.output, "hello");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let registry = registry();
        let ctx = ToolContext::default();
        let result = registry.execute("drop_tables", json!({}), &ctx).await;
        assert!(result.is_error);
        assert!(result.output.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_rejected_at_boundary() {
        let registry = registry();
        let ctx = ToolContext::default();
        let result = registry.execute("echo", json!({}), &ctx).await;
        assert!(result.is_error);
        assert!(result.output.contains("missing required parameter 'text'"));
    }

    #[test]
    fn test_terminal_flag() {
        let registry = registry();
        assert!(registry.is_terminal("finish"));
        assert!(!registry.is_terminal("echo"));
        assert!(!registry.is_terminal("nonexistent"));
    }

    #[test]
    fn test_definitions_cover_all_tools() {
        let registry = registry();
        let mut names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        names.sort();
        assert_eq!(names, vec!["echo", "finish"]);
    }
}
