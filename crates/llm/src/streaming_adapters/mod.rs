//! Provider-Specific Stream Adapters
//!
//! Each adapter handles the unique streaming format of its provider.

pub mod ollama;

pub use ollama::OllamaAdapter;
