//! Built-in Tools
//!
//! Small in-process tools registered by default so the CLI has something to
//! call without any external tool server.

use std::sync::Arc;

use serde_json::{json, Value};

use qwen_chat_tools::{FunctionTool, Tool, ToolRegistry, ToolResult};

/// Registry with every built-in tool.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(current_time_tool());
    registry
}

/// Current date and time, optionally as a UTC offset such as "+02:00".
pub fn current_time_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::new(
        "current_time",
        "Get the current date and time",
        json!({
            "type": "object",
            "properties": {
                "utc_offset": {
                    "type": "string",
                    "description": "Offset from UTC such as +02:00; defaults to local time"
                }
            }
        }),
        |args| Box::pin(async move { current_time(&args) }),
    ))
}

fn current_time(args: &Value) -> ToolResult {
    let now = chrono::Utc::now();
    match args.get("utc_offset").and_then(Value::as_str) {
        Some(offset) => match offset.parse::<chrono::FixedOffset>() {
            Ok(tz) => ToolResult::ok(json!({ "time": now.with_timezone(&tz).to_rfc3339() })),
            Err(_) => ToolResult::err(format!("Invalid utc_offset: {}", offset)),
        },
        None => ToolResult::ok(json!({
            "time": now.with_timezone(&chrono::Local).to_rfc3339()
        })),
    }
}
