//! Data Models
//!
//! Configuration structures shared by the CLI, the storage layer, and the
//! generation services.

pub mod settings;

pub use settings::*;
