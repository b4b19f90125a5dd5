//! Generation Events
//!
//! `StreamEvent` is what the generation loop produces; `ClientEvent` is the
//! subset a client ever sees.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use qwen_chat_llm::{LlmError, ToolCall};

/// Event produced by the generation loop.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Assistant text safe to show to the user
    Passthrough { text: String },
    /// Calls extracted at the end of a round; never forwarded
    ToolCallsDetected { calls: Vec<ToolCall> },
    /// Request finished. `content` carries a short-circuit answer and is
    /// empty after streamed generation.
    Done { content: String },
    /// Request failed; `message` is shown to the user
    Failed { message: String },
}

impl StreamEvent {
    /// Client-visible projection of this event.
    pub fn to_client(&self) -> Option<ClientEvent> {
        match self {
            StreamEvent::Passthrough { text } => Some(ClientEvent::PartialText {
                content: text.clone(),
            }),
            StreamEvent::ToolCallsDetected { .. } => None,
            StreamEvent::Done { content } => Some(ClientEvent::Completion {
                content: content.clone(),
            }),
            StreamEvent::Failed { message } => Some(ClientEvent::Error {
                message: message.clone(),
            }),
        }
    }
}

/// Event delivered to the client, in order. `Completion` and `Error` are
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    PartialText { content: String },
    Completion { content: String },
    Error { message: String },
}

impl ClientEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClientEvent::PartialText { .. })
    }

    /// Text this event contributes to the assistant message.
    pub fn content(&self) -> &str {
        match self {
            ClientEvent::PartialText { content } | ClientEvent::Completion { content } => content,
            ClientEvent::Error { message } => message,
        }
    }

    /// Ollama-compatible chat chunk. Errors are rendered as a final assistant
    /// message so chat clients show them inline.
    pub fn to_chat_chunk(&self) -> Value {
        json!({
            "message": {
                "role": "assistant",
                "content": self.content(),
            },
            "done": self.is_terminal(),
        })
    }

    /// Chat chunk stamped with the current time, as Ollama does.
    pub fn to_timestamped_chunk(&self) -> Value {
        let mut chunk = self.to_chat_chunk();
        chunk["created_at"] = Value::String(chrono::Utc::now().to_rfc3339());
        chunk
    }

    /// Server-sent-events frame of the chat chunk.
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_chat_chunk())
    }
}

/// User-facing text for a backend failure.
pub fn backend_failure_text(error: &LlmError) -> String {
    let detail = if error.detail().is_empty() {
        "Unknown error"
    } else {
        error.detail()
    };
    format!(
        "I apologize, but I encountered an error: {}: {}",
        error.kind(),
        detail
    )
}
