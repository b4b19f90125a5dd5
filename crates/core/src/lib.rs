//! Qwen Chat Core
//!
//! Backend-level stream event types shared by the Qwen Chat workspace.
//! This crate has no dependencies on the backend transport or the tool layer.
//!
//! ## Module Organization
//!
//! - `streaming` - Backend-level stream event types and the adapter trait
//!
//! ## Design Principles
//!
//! 1. **No external dependencies beyond serde/thiserror** - keeps build times minimal
//! 2. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod streaming;

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::{AdapterError, StreamAdapter, UnifiedStreamEvent};
