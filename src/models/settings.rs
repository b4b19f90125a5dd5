//! Settings Models
//!
//! Application configuration stored in `config.toml`.

use serde::{Deserialize, Serialize};

use qwen_chat_llm::{GenerationOptions, ProviderConfig};

/// Sampling presets trading latency for quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceProfile {
    Fast,
    #[default]
    Balanced,
    Quality,
}

impl PerformanceProfile {
    /// Sampling options for this profile.
    pub fn options(&self) -> GenerationOptions {
        let base = GenerationOptions::default();
        match self {
            PerformanceProfile::Fast => GenerationOptions {
                context_window: 1024,
                max_tokens: 256,
                temperature: 0.7,
                top_k: 20,
                top_p: 0.8,
                keep_alive: "10m".to_string(),
                ..base
            },
            PerformanceProfile::Balanced => base,
            PerformanceProfile::Quality => GenerationOptions {
                context_window: 4096,
                max_tokens: 1024,
                temperature: 0.8,
                top_k: 60,
                top_p: 0.95,
                ..base
            },
        }
    }
}

impl std::str::FromStr for PerformanceProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "quality" => Ok(Self::Quality),
            other => Err(format!(
                "Unknown profile: {}. Must be 'fast', 'balanced', or 'quality'",
                other
            )),
        }
    }
}

/// Sampling configuration: a profile plus optional per-option overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub profile: PerformanceProfile,
    /// Size the output budget from the shape of the latest message
    pub adaptive_max_tokens: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfs_z: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typical_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            profile: PerformanceProfile::default(),
            adaptive_max_tokens: true,
            temperature: None,
            max_tokens: None,
            context_window: None,
            top_k: None,
            top_p: None,
            repeat_penalty: None,
            tfs_z: None,
            typical_p: None,
            keep_alive: None,
        }
    }
}

impl GenerationSettings {
    /// Profile options with overrides applied.
    pub fn resolve(&self) -> GenerationOptions {
        let mut options = self.profile.options();
        if let Some(v) = self.temperature {
            options.temperature = v;
        }
        if let Some(v) = self.max_tokens {
            options.max_tokens = v;
        }
        if let Some(v) = self.context_window {
            options.context_window = v;
        }
        if let Some(v) = self.top_k {
            options.top_k = v;
        }
        if let Some(v) = self.top_p {
            options.top_p = v;
        }
        if let Some(v) = self.repeat_penalty {
            options.repeat_penalty = v;
        }
        if let Some(v) = self.tfs_z {
            options.tfs_z = v;
        }
        if let Some(v) = self.typical_p {
            options.typical_p = v;
        }
        if let Some(v) = &self.keep_alive {
            options.keep_alive = v.clone();
        }
        options
    }

    /// Adaptive budgeting applies unless disabled or max_tokens is pinned.
    pub fn uses_adaptive_max_tokens(&self) -> bool {
        self.adaptive_max_tokens && self.max_tokens.is_none()
    }
}

/// Generation loop limits and prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Maximum backend rounds per request
    pub max_iterations: usize,
    /// Maximum tools offered per request
    pub tool_top_k: usize,
    /// Conversation messages kept before the first round
    pub history_max_messages: usize,
    /// Replaces the built-in system prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            tool_top_k: 10,
            history_max_messages: 10,
            system_prompt: None,
        }
    }
}

/// Response cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_size: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 100,
            ttl_seconds: 3600,
        }
    }
}

/// A canned response served without contacting the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    /// Case-insensitive regexes matched against the latest user message
    pub patterns: Vec<String>,
    pub body: String,
}

/// Application configuration stored in config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    pub backend: ProviderConfig,
    pub generation: GenerationSettings,
    pub orchestrator: OrchestratorSettings,
    pub cache: CacheSettings,
    /// Overrides the built-in template set when non-empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            backend: ProviderConfig::default(),
            generation: GenerationSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            cache: CacheSettings::default(),
            templates: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !["trace", "debug", "info", "warn", "error"].contains(&self.log_level.as_str()) {
            return Err(format!("Invalid log_level: {}", self.log_level));
        }

        if self.backend.model.trim().is_empty() {
            return Err("backend.model must not be empty".to_string());
        }
        if url::Url::parse(&self.backend.base_url).is_err() {
            return Err(format!("Invalid backend.base_url: {}", self.backend.base_url));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err("backend.request_timeout_secs must be at least 1".to_string());
        }

        let options = self.generation.resolve();
        if !(0.0..=2.0).contains(&options.temperature) {
            return Err(format!(
                "temperature must be between 0 and 2, got {}",
                options.temperature
            ));
        }
        if !(options.top_p > 0.0 && options.top_p <= 1.0) {
            return Err(format!("top_p must be in (0, 1], got {}", options.top_p));
        }
        if options.max_tokens == 0 || options.context_window == 0 {
            return Err("max_tokens and context_window must be at least 1".to_string());
        }

        if self.orchestrator.max_iterations == 0 {
            return Err("orchestrator.max_iterations must be at least 1".to_string());
        }
        if self.orchestrator.tool_top_k == 0 {
            return Err("orchestrator.tool_top_k must be at least 1".to_string());
        }
        if self.orchestrator.history_max_messages == 0 {
            return Err("orchestrator.history_max_messages must be at least 1".to_string());
        }

        if self.cache.max_size == 0 {
            return Err("cache.max_size must be at least 1".to_string());
        }
        if self.cache.ttl_seconds == 0 {
            return Err("cache.ttl_seconds must be at least 1".to_string());
        }

        for template in &self.templates {
            if template.patterns.is_empty() {
                return Err(format!("Template '{}' has no patterns", template.name));
            }
            for pattern in &template.patterns {
                if let Err(e) = regex::Regex::new(pattern) {
                    return Err(format!(
                        "Template '{}' has an invalid pattern '{}': {}",
                        template.name, pattern, e
                    ));
                }
            }
        }

        Ok(())
    }
}
