//! Tool Execution Result
//!
//! Portable result type returned by every tool invocation, plus the text
//! that is folded back into the conversation for the model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool-result content recorded when an invocation fails.
pub const TOOL_FAILURE_MARKER: &str = "Tool execution failed";

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution was successful
    pub success: bool,
    /// Output from the tool (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn ok(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    /// Create an error result
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Error text for display, falling back to a generic message.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }

    /// Content of the tool-result message sent back to the model.
    ///
    /// Successful output is JSON-serialised; failures carry the literal
    /// failure marker so the model can react to them.
    pub fn to_content(&self) -> String {
        match (&self.output, self.success) {
            (Some(output), true) => output.to_string(),
            (None, true) => Value::Null.to_string(),
            _ => TOOL_FAILURE_MARKER.to_string(),
        }
    }
}
