//! Ollama NDJSON Stream Adapter
//!
//! Handles the newline-delimited JSON format of Ollama's `/api/chat` endpoint.
//! Each line carries an optional content delta, optional structured tool calls,
//! and a `done` flag; the final line also carries token counts.

use qwen_chat_core::streaming::{AdapterError, StreamAdapter, UnifiedStreamEvent};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    function: ChunkFunction,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Adapter for Ollama's NDJSON chat stream
pub struct OllamaAdapter {
    model: String,
    /// Number of structured tool calls seen in this stream
    tool_calls_seen: usize,
}

impl OllamaAdapter {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            tool_calls_seen: 0,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Render tool arguments as the JSON text that the extractor decodes.
    ///
    /// Some models send arguments as a JSON-encoded string instead of an
    /// object; the string is passed through so decoding sees the inner text.
    fn arguments_text(arguments: Value) -> String {
        match arguments {
            Value::String(raw) => raw,
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        }
    }
}

impl StreamAdapter for OllamaAdapter {
    fn provider_name(&self) -> &'static str {
        "ollama"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn adapt(&mut self, input: &str) -> Result<Vec<UnifiedStreamEvent>, AdapterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(vec![]);
        }

        let chunk: OllamaChunk =
            serde_json::from_str(trimmed).map_err(|e| AdapterError::ParseError(e.to_string()))?;

        if let Some(message) = chunk.error {
            return Ok(vec![UnifiedStreamEvent::Error {
                message,
                code: None,
            }]);
        }

        let mut events = vec![];

        if let Some(message) = chunk.message {
            if let Some(content) = message.content {
                if !content.is_empty() {
                    events.push(UnifiedStreamEvent::TextDelta { content });
                }
            }
            for call in message.tool_calls.unwrap_or_default() {
                self.tool_calls_seen += 1;
                events.push(UnifiedStreamEvent::ToolComplete {
                    tool_id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    tool_name: call.function.name,
                    arguments: Self::arguments_text(call.function.arguments),
                });
            }
        }

        if chunk.done {
            if let (Some(input_tokens), Some(output_tokens)) =
                (chunk.prompt_eval_count, chunk.eval_count)
            {
                events.push(UnifiedStreamEvent::Usage {
                    input_tokens,
                    output_tokens,
                });
            }
            let stop_reason = chunk.done_reason.or_else(|| {
                if self.tool_calls_seen > 0 {
                    Some("tool_calls".to_string())
                } else {
                    Some("stop".to_string())
                }
            });
            events.push(UnifiedStreamEvent::Complete { stop_reason });
        }

        Ok(events)
    }

    fn reset(&mut self) {
        self.tool_calls_seen = 0;
    }
}
