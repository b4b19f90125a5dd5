//! Inline Tool-Call Stream Demultiplexer
//!
//! Splits a chunked text stream into plain assistant text and
//! `<tool_call ...>...</tool_call>` spans. Plain text is released as soon as
//! it cannot be part of an unfinished tag; complete tag spans are retained
//! for the extractor.
//!
//! Tags may straddle chunk boundaries at any offset, including inside the
//! opening marker itself, so a trailing fragment such as `"<tool_c"` is
//! held back until the next chunk decides it.

use tracing::{debug, warn};

/// Opening marker of an inline tool call.
pub const TOOL_CALL_OPEN: &str = "<tool_call";

/// Closing marker of an inline tool call.
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// Per-round display buffer.
#[derive(Debug, Default)]
pub struct ToolCallDemux {
    /// Raw text not yet classified
    buffer: String,
    /// Complete tag spans, in stream order
    tags: Vec<String>,
}

impl ToolCallDemux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the passthrough text it released, in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        self.drain(false)
    }

    /// End the round. Returns the trailing passthrough unless a tag is still
    /// open; an unclosed tag is dropped from the output.
    pub fn finish(&mut self) -> Option<String> {
        let mut out = self.drain(true);
        if !self.buffer.is_empty() {
            warn!(
                "[ToolCallDemux] Dropping unclosed tool call at end of round ({} bytes)",
                self.buffer.len()
            );
            self.buffer.clear();
        }
        match out.len() {
            0 => None,
            1 => out.pop(),
            _ => Some(out.concat()),
        }
    }

    /// Take the complete tag spans collected so far.
    pub fn take_tags(&mut self) -> Vec<String> {
        std::mem::take(&mut self.tags)
    }

    /// Whether an opening marker is waiting for its closing marker.
    pub fn has_open_tag(&self) -> bool {
        self.buffer.contains(TOOL_CALL_OPEN)
    }

    /// Reset for a new round.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.tags.clear();
    }

    fn drain(&mut self, at_end: bool) -> Vec<String> {
        let mut out = Vec::new();
        loop {
            let Some(start) = self.buffer.find(TOOL_CALL_OPEN) else {
                let hold = if at_end {
                    0
                } else {
                    partial_marker_len(&self.buffer)
                };
                let ready = self.buffer.len() - hold;
                if ready > 0 {
                    out.push(self.buffer.drain(..ready).collect());
                }
                break;
            };

            if start > 0 {
                out.push(self.buffer.drain(..start).collect());
            }

            // The buffer now starts with the opening marker.
            let Some(close) = self.buffer.find(TOOL_CALL_CLOSE) else {
                break;
            };
            let end = close + TOOL_CALL_CLOSE.len();
            let tag: String = self.buffer.drain(..end).collect();
            debug!("[ToolCallDemux] Captured tool call span ({} bytes)", tag.len());
            self.tags.push(tag);
        }
        out
    }
}

/// Length of the longest proper prefix of the opening marker that ends `text`.
fn partial_marker_len(text: &str) -> usize {
    (1..TOOL_CALL_OPEN.len())
        .rev()
        .find(|&k| text.ends_with(&TOOL_CALL_OPEN[..k]))
        .unwrap_or(0)
}
