//! Storage Layer
//!
//! Persists the TOML configuration file.

pub mod config;

pub use config::*;
