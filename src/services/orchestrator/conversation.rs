//! Conversation Preparation
//!
//! Shapes an incoming conversation into what the backend sees on the first
//! round: trimmed history, a system prompt with the tool summary, and an
//! output budget sized from the latest message.

use qwen_chat_llm::{Message, MessageRole, ToolDefinition};
use qwen_chat_tools::build_tool_call_instructions;

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Qwen, a friendly assistant with direct access to tools on the user's computer and browser.

When the user asks you to do something a tool can do, call the tool immediately instead of explaining how to do it by hand. Do not ask follow-up questions unless the request is genuinely ambiguous.

Call a tool with this exact syntax:
<tool_call name=\"tool_name\">{\"parameter\": \"value\"}</tool_call>

Example:
User: open youtube
You: Opening YouTube for you.
<tool_call name=\"browser_navigate\">{\"url\": \"https://www.youtube.com\"}</tool_call>";

const SHORT_QUERY_CHARS: usize = 50;
const SHORT_QUERY_TOKENS: u32 = 256;
const CODE_TOKENS: u32 = 1024;
const EXPLAIN_TOKENS: u32 = 768;

const CODE_KEYWORDS: &[&str] = &[
    "code", "implement", "create", "build", "write", "function", "class", "script", "program",
    "develop", "generate",
];

const EXPLAIN_KEYWORDS: &[&str] = &[
    "explain",
    "describe",
    "what is",
    "how does",
    "why",
    "documentation",
];

/// Content of the most recent user message, or "" if there is none.
pub fn latest_user_text(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

/// Output budget for the last message: short prompts get short answers,
/// code requests get the most room.
pub fn optimal_max_tokens(messages: &[Message], default_max: u32) -> u32 {
    let Some(last) = messages.last() else {
        return default_max;
    };
    let text = last.content.to_lowercase();

    if text.chars().count() < SHORT_QUERY_CHARS {
        SHORT_QUERY_TOKENS
    } else if CODE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        CODE_TOKENS
    } else if EXPLAIN_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        EXPLAIN_TOKENS
    } else {
        default_max
    }
}

/// Keep the last `max_messages` messages, preceded by any system messages
/// that fell outside that window.
pub fn truncate_history(messages: &[Message], max_messages: usize) -> Vec<Message> {
    if messages.len() <= max_messages {
        return messages.to_vec();
    }
    let cut = messages.len() - max_messages;
    messages[..cut]
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .chain(messages[cut..].iter())
        .cloned()
        .collect()
}

/// System prompt plus the summary of the tools offered this request.
pub fn build_system_message(system_prompt: Option<&str>, tools: &[ToolDefinition]) -> Message {
    let mut content = system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT).to_string();
    content.push_str(&build_tool_call_instructions(tools));
    Message::system(content)
}

/// Backend message list for the first round.
pub fn prepare_messages(
    messages: &[Message],
    history_max_messages: usize,
    system_prompt: Option<&str>,
    tools: &[ToolDefinition],
) -> Vec<Message> {
    let history = truncate_history(messages, history_max_messages);
    let mut prepared = Vec::with_capacity(history.len() + 1);
    prepared.push(build_system_message(system_prompt, tools));
    prepared.extend(history);
    prepared
}
