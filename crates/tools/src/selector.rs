//! Tool Selection
//!
//! Narrows the registry down to the tools relevant to one query so the
//! model is not flooded with definitions it will not use.

use std::collections::HashSet;

use qwen_chat_llm::ToolDefinition;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "from", "with", "into", "this", "that", "you", "your", "can", "please",
];

/// Picks the tools offered to the model for a query.
///
/// Names the selector returns are resolved against the executor's current
/// definitions; names it no longer knows are skipped.
pub trait ToolSelector: Send + Sync {
    /// Return at most `top_k` tool names, most relevant first.
    fn select(&self, query: &str, top_k: usize) -> Vec<String>;
}

/// Scores tools by word overlap between the query and each tool's name and
/// description. Tools listed as critical are always offered first.
#[derive(Debug, Clone, Default)]
pub struct KeywordToolSelector {
    catalog: Vec<ToolDefinition>,
    critical: Vec<String>,
}

impl KeywordToolSelector {
    pub fn new(catalog: Vec<ToolDefinition>) -> Self {
        Self {
            catalog,
            critical: Vec::new(),
        }
    }

    /// Tools that are offered for every query, regardless of score.
    pub fn with_critical(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.critical = names.into_iter().map(Into::into).collect();
        self
    }

    fn words(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
            .map(str::to_lowercase)
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .collect()
    }

    fn score(query_words: &HashSet<String>, tool: &ToolDefinition) -> usize {
        let tool_words = Self::words(&format!("{} {}", tool.name, tool.description));
        query_words.intersection(&tool_words).count()
    }
}

impl ToolSelector for KeywordToolSelector {
    fn select(&self, query: &str, top_k: usize) -> Vec<String> {
        let available = &self.catalog;
        let mut selected: Vec<String> = self
            .critical
            .iter()
            .filter(|name| available.iter().any(|t| &t.name == *name))
            .take(top_k)
            .cloned()
            .collect();

        let query_words = Self::words(query);
        let mut scored: Vec<(usize, usize, &ToolDefinition)> = available
            .iter()
            .enumerate()
            .filter(|(_, t)| !selected.contains(&t.name))
            .map(|(i, t)| (Self::score(&query_words, t), i, t))
            .filter(|(score, _, _)| *score > 0)
            .collect();
        // Highest score first; registration order breaks ties.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let room = top_k.saturating_sub(selected.len());
        selected.extend(scored.into_iter().take(room).map(|(_, _, t)| t.name.clone()));
        selected
    }
}
