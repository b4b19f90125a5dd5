//! Qwen Chat - Streaming Tool-Augmented Chat Backend
//!
//! Turns the incremental output of a local Ollama model into a client event
//! stream, running the tool calls the model asks for along the way.
//! It includes:
//! - Generation orchestrator with inline tool-call demultiplexing
//! - Response cache and template short-circuits
//! - TOML configuration and logging setup
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::settings::{AppConfig, PerformanceProfile};
pub use services::{
    ClientEvent, GenerationOrchestrator, GenerationRequest, GenerationStream, ResponseCache,
    TemplateMatcher,
};
pub use state::AppState;
pub use storage::ConfigService;
pub use utils::error::{AppError, AppResult};
