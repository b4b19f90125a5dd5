//! Generation Orchestrator
//!
//! Bounded, streaming, tool-augmented generation over a chat backend.

pub mod conversation;
pub mod events;
pub mod generation;

pub use conversation::{
    build_system_message, latest_user_text, optimal_max_tokens, prepare_messages,
    truncate_history, DEFAULT_SYSTEM_PROMPT,
};
pub use events::{backend_failure_text, ClientEvent, StreamEvent};
pub use generation::{
    GenerationOrchestrator, GenerationRequest, GenerationStream, OrchestratorConfig,
};
