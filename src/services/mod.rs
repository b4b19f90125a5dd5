//! Services
//!
//! Business logic: the response cache, the template matcher and the
//! generation orchestrator that ties them to the backend and the tools.

pub mod builtin_tools;
pub mod cache;
pub mod orchestrator;
pub mod templates;

pub use builtin_tools::builtin_registry;
pub use cache::{CacheStats, ResponseCache};
pub use orchestrator::{
    ClientEvent, GenerationOrchestrator, GenerationRequest, GenerationStream, OrchestratorConfig,
    StreamEvent,
};
pub use templates::{default_templates, TemplateMatcher};
