//! Tool-Call Extraction
//!
//! Produces the canonical tool-call list for one round from the two
//! encodings a model may use:
//!
//! 1. Structured calls reported by the backend alongside content deltas.
//! 2. Inline `<tool_call name="X">{json}</tool_call>` spans captured by
//!    [`ToolCallDemux`](crate::stream_demux::ToolCallDemux).
//!
//! Structured calls take total precedence: once any structured call is
//! reported in a round, inline spans from that round are discarded.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::stream_demux::{TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use qwen_chat_llm::ToolCall;

/// Why a single tool call could not be recovered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedToolCall {
    #[error("not a tool_call span")]
    NotATag,
    #[error("missing tool name")]
    MissingName,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
}

fn name_attribute() -> Option<&'static Regex> {
    static NAME_ATTR: OnceLock<Option<Regex>> = OnceLock::new();
    NAME_ATTR
        .get_or_init(|| Regex::new(r#"\bname\s*=\s*"([^"]*)""#).ok())
        .as_ref()
}

/// Parse one complete inline span into a tool call.
///
/// The span must start with the opening marker and end with the closing
/// marker. The `name` attribute is required unless the body is a JSON
/// object of the form `{"name": ..., "arguments": ...}`.
pub fn parse_tool_call_tag(tag: &str) -> Result<ToolCall, MalformedToolCall> {
    let inner = tag
        .strip_prefix(TOOL_CALL_OPEN)
        .and_then(|rest| rest.strip_suffix(TOOL_CALL_CLOSE))
        .ok_or(MalformedToolCall::NotATag)?;
    let header_end = inner.find('>').ok_or(MalformedToolCall::NotATag)?;
    let (attrs, body) = (&inner[..header_end], inner[header_end + 1..].trim());

    let name = name_attribute()
        .and_then(|re| re.captures(attrs))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|n| !n.is_empty());

    let payload: Value =
        serde_json::from_str(body).map_err(|e| MalformedToolCall::InvalidJson(e.to_string()))?;

    match name {
        Some(name) => Ok(ToolCall::new(name, payload)),
        None => nameless_call(payload),
    }
}

/// Recover `{"name": "x", "arguments": {...}}` bodies from a name-less tag.
fn nameless_call(payload: Value) -> Result<ToolCall, MalformedToolCall> {
    let Value::Object(mut obj) = payload else {
        return Err(MalformedToolCall::MissingName);
    };
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or(MalformedToolCall::MissingName)?;
    let arguments = obj
        .remove("arguments")
        .unwrap_or_else(|| Value::Object(Default::default()));
    Ok(ToolCall::new(name, arguments))
}

/// Decode the arguments text of a structured call.
pub fn decode_structured_call(name: &str, arguments: &str) -> Result<ToolCall, MalformedToolCall> {
    if name.trim().is_empty() {
        return Err(MalformedToolCall::MissingName);
    }
    let trimmed = arguments.trim();
    let arguments = if trimmed.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(trimmed).map_err(|e| MalformedToolCall::InvalidJson(e.to_string()))?
    };
    Ok(ToolCall::new(name, arguments))
}

/// Per-round accumulator of both call encodings.
#[derive(Debug, Default)]
pub struct ToolCallExtractor {
    structured: Vec<(String, String)>,
    inline: Vec<String>,
}

impl ToolCallExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a structured call as reported by the backend.
    pub fn record_structured(&mut self, name: impl Into<String>, arguments: impl Into<String>) {
        self.structured.push((name.into(), arguments.into()));
    }

    /// Record complete inline spans from the demultiplexer.
    pub fn record_inline(&mut self, tags: impl IntoIterator<Item = String>) {
        self.inline.extend(tags);
    }

    /// Whether the backend reported any structured call this round.
    pub fn has_structured(&self) -> bool {
        !self.structured.is_empty()
    }

    /// Produce the canonical list for the round, in detection order, and
    /// reset for the next round.
    ///
    /// A call that fails to decode is dropped on its own; the rest survive.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        let structured = std::mem::take(&mut self.structured);
        let inline = std::mem::take(&mut self.inline);

        if !structured.is_empty() {
            if !inline.is_empty() {
                debug!(
                    "[ToolCallExtractor] Discarding {} inline tool call(s); structured calls take precedence",
                    inline.len()
                );
            }
            return structured
                .into_iter()
                .filter_map(|(name, args)| match decode_structured_call(&name, &args) {
                    Ok(call) => Some(call),
                    Err(e) => {
                        warn!("[ToolCallExtractor] Dropping structured call '{}': {}", name, e);
                        None
                    }
                })
                .collect();
        }

        inline
            .iter()
            .filter_map(|tag| match parse_tool_call_tag(tag) {
                Ok(call) => Some(call),
                Err(e) => {
                    warn!("[ToolCallExtractor] Dropping inline tool call: {}", e);
                    None
                }
            })
            .collect()
    }
}
