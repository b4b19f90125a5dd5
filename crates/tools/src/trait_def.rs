//! Tool Trait and Registry
//!
//! `Tool` is the unit of capability; `ToolExecutor` is the narrow seam the
//! orchestrator talks to (`describe` + `invoke`). `ToolRegistry` is the
//! in-process executor. Remote tool servers implement `ToolExecutor` directly.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::executor::ToolResult;
use qwen_chat_llm::ToolDefinition;

/// A single tool that the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of this tool (e.g., "browser_navigate")
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does
    fn description(&self) -> &str;

    /// JSON schema describing the tool's input parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// Arguments are only known to be syntactically valid JSON; the tool is
    /// responsible for interpreting them.
    async fn execute(&self, args: Value) -> ToolResult;
}

/// Tool Registry/Executor interface consumed by the orchestrator.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions of every available tool, in a stable order.
    fn describe(&self) -> Vec<ToolDefinition>;

    /// Invoke a tool by name.
    async fn invoke(&self, name: &str, arguments: Value) -> ToolResult;
}

/// Registry of available tools.
///
/// Provides O(1) lookup by name and registration-order iteration.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Insertion order for deterministic iteration
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. If a tool with the same name already exists, it is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Unregister a tool by name. Returns the removed tool, or None if not found.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.order.retain(|n| n != name);
        self.tools.remove(name)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all registered tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn describe(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }

    /// Returns `ToolResult::err` if the tool is not found.
    async fn invoke(&self, name: &str, arguments: Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.execute(arguments).await,
            None => ToolResult::err(format!("Unknown tool: {}", name)),
        }
    }
}

// ── FunctionTool ─────────────────────────────────────────────────────

/// Type alias for the async handler function used by `FunctionTool`.
pub type FunctionToolHandler =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> + Send + Sync>;

/// A tool created from an async closure.
///
/// # Example
///
/// ```ignore
/// let tool = FunctionTool::new(
///     "echo",
///     "Echoes the input",
///     serde_json::json!({"type": "object"}),
///     |args| Box::pin(async move { ToolResult::ok(args) }),
/// );
/// ```
pub struct FunctionTool {
    tool_name: String,
    tool_description: String,
    schema: Value,
    handler: FunctionToolHandler,
}

impl FunctionTool {
    /// Create a new FunctionTool from an async closure.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> + Send + Sync + 'static,
    {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            schema,
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        (self.handler)(args).await
    }
}
