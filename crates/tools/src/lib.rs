//! Qwen Chat Tools
//!
//! Tool-side building blocks of the generation loop:
//! - `Tool` trait, `ToolExecutor` seam, `ToolRegistry`, `FunctionTool`
//! - `ToolResult` - execution result type
//! - `ToolSelector` - relevance filtering of offered tools
//! - `ToolCallDemux` - separates inline tool-call markup from streamed text
//! - `ToolCallExtractor` - canonical per-round tool-call list
//! - prompt helpers for inline tool-call syntax

pub mod executor;
pub mod extractor;
pub mod prompt_fallback;
pub mod selector;
pub mod stream_demux;
pub mod trait_def;

// Re-export core types
pub use executor::{ToolResult, TOOL_FAILURE_MARKER};
pub use extractor::{
    decode_structured_call, parse_tool_call_tag, MalformedToolCall, ToolCallExtractor,
};
pub use prompt_fallback::{build_tool_call_instructions, format_tool_error};
pub use selector::{KeywordToolSelector, ToolSelector};
pub use stream_demux::ToolCallDemux;
pub use trait_def::{FunctionTool, FunctionToolHandler, Tool, ToolExecutor, ToolRegistry};
