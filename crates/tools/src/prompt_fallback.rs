//! Prompt-Based Tool Calling
//!
//! Models that do not reliably emit structured tool calls are told to write
//! inline `<tool_call name="...">{json}</tool_call>` markup instead. This
//! module builds the system-prompt section that teaches that syntax for the
//! tools selected for a request, and formats the inline notice shown to the
//! user when a tool fails.

use qwen_chat_llm::ToolDefinition;

/// Maximum characters of a tool description shown in the system prompt.
const MAX_DESCRIPTION_CHARS: usize = 100;

/// Build the tool section appended to the system prompt.
///
/// Returns an empty string when no tools are offered.
pub fn build_tool_call_instructions(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let mut section = String::from("\n\n**AVAILABLE TOOLS FOR THIS REQUEST:**\n");
    for tool in tools {
        section.push_str(&format!(
            "- {}: {}\n",
            tool.name,
            truncate_description(&tool.description)
        ));
    }
    section.push_str(
        "\n**REMEMBER:** Use <tool_call name=\"tool_name\">{\"param\": \"value\"}</tool_call> syntax!\n",
    );
    section
}

fn truncate_description(description: &str) -> String {
    let description = description.trim();
    match description.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((cut, _)) => format!("{}...", &description[..cut]),
        None => description.to_string(),
    }
}

/// Inline passthrough text reporting a failed tool call to the user.
pub fn format_tool_error(tool_name: &str, error: &str) -> String {
    format!("\n\n[Tool: {} encountered an error: {}]\n", tool_name, error)
}
