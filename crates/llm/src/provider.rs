//! LLM Provider Trait
//!
//! Defines the common interface for LLM backends. A backend opens one
//! streaming round at a time; the orchestrator drives rounds and owns all
//! tool handling.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::types::{GenerationOptions, LlmError, LlmResult, Message, ToolDefinition};
use qwen_chat_core::streaming::UnifiedStreamEvent;

/// Incremental events of one round. The stream ends after a terminal event.
///
/// Dropping the stream abandons the round and releases the connection.
pub type RoundStream = Pin<Box<dyn Stream<Item = LlmResult<UnifiedStreamEvent>> + Send>>;

/// Everything the backend needs to open one round.
#[derive(Debug, Clone, Default)]
pub struct RoundRequest {
    /// Full conversation so far
    pub messages: Vec<Message>,
    /// Tools offered to the model for this round
    pub tools: Vec<ToolDefinition>,
    /// Sampling options
    pub options: GenerationOptions,
}

/// Trait that all LLM backends must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Returns whether this provider reports structured tool calls.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Open one streaming round.
    ///
    /// Connection and status failures are returned here; failures after the
    /// first byte arrive as `Err` items on the stream.
    async fn open_round(&self, request: RoundRequest) -> LlmResult<RoundStream>;

    /// Check if the backend is healthy and reachable.
    async fn health_check(&self) -> LlmResult<()>;

    /// List available models (if supported by provider).
    ///
    /// Returns None if the provider doesn't support model listing.
    async fn list_models(&self) -> LlmResult<Option<Vec<String>>> {
        Ok(None)
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Unauthorized", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        408 => LlmError::Timeout {
            message: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
