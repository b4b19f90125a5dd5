//! Unified Stream Event Types
//!
//! Backend-agnostic event types and adapter trait for processing real-time
//! LLM responses. Provider implementations in the LLM crate produce these
//! events; the orchestrator in the main crate consumes them one round at a time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified streaming event that every backend adapter converts to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedStreamEvent {
    /// Text content delta from the model
    TextDelta { content: String },

    /// Structured tool call reported out-of-band by the backend
    ToolComplete {
        tool_id: String,
        tool_name: String,
        /// Complete JSON string of tool arguments
        arguments: String,
    },

    /// Token usage information
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },

    /// Error reported inside the stream
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Round complete
    Complete {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
}

impl UnifiedStreamEvent {
    /// Whether this event ends the round.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Errors raised while adapting a raw stream line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// Invalid format that couldn't be parsed
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// JSON/data parsing error
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Converts one backend wire format into [`UnifiedStreamEvent`]s.
pub trait StreamAdapter: Send + Sync {
    /// Returns the provider name for logging and identification.
    fn provider_name(&self) -> &'static str;

    /// Returns whether this adapter/provider reports structured tool calls.
    fn supports_tools(&self) -> bool;

    /// Adapt a raw stream line/chunk to unified events.
    ///
    /// A single input line may produce zero, one, or multiple events.
    fn adapt(&mut self, input: &str) -> Result<Vec<UnifiedStreamEvent>, AdapterError>;

    /// Reset adapter state for a new stream.
    fn reset(&mut self) {
        // Default implementation does nothing
    }
}
