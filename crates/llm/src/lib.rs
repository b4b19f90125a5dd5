//! Qwen Chat LLM
//!
//! Backend abstraction for streamed, tool-capable chat rounds, with the
//! Ollama implementation used by the application.
//!
//! Also includes the Ollama NDJSON stream adapter and the HTTP client factory.

pub mod http_client;
pub mod ollama;
pub mod provider;
pub mod streaming_adapters;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use ollama::OllamaProvider;
pub use provider::{LlmProvider, RoundRequest, RoundStream};
pub use types::*;

// Re-export streaming adapters
pub use streaming_adapters::OllamaAdapter;
