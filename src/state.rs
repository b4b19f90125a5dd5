//! Application State
//!
//! Wires configuration, backend, tools, cache and templates into one
//! orchestrator shared by every request.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use qwen_chat_llm::{LlmProvider, OllamaProvider};
use qwen_chat_tools::{KeywordToolSelector, ToolExecutor, ToolRegistry};

use crate::models::settings::AppConfig;
use crate::services::builtin_tools::builtin_registry;
use crate::services::cache::ResponseCache;
use crate::services::orchestrator::{GenerationOrchestrator, OrchestratorConfig};
use crate::services::templates::TemplateMatcher;
use crate::utils::error::{AppError, AppResult};

/// Long-lived services of a running application.
pub struct AppState {
    config: AppConfig,
    provider: Arc<dyn LlmProvider>,
    cache: Arc<ResponseCache>,
    orchestrator: GenerationOrchestrator,
}

impl AppState {
    /// Build the state with the built-in tools.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_tools(config, builtin_registry())
    }

    /// Build the state against an explicit tool registry.
    pub fn with_tools(config: AppConfig, tools: ToolRegistry) -> AppResult<Self> {
        config.validate().map_err(AppError::validation)?;
        let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(config.backend.clone())?);
        Ok(Self::assemble(config, provider, tools))
    }

    /// Build the state around an existing backend.
    pub fn with_provider(
        config: AppConfig,
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
    ) -> AppResult<Self> {
        config.validate().map_err(AppError::validation)?;
        Ok(Self::assemble(config, provider, tools))
    }

    fn assemble(config: AppConfig, provider: Arc<dyn LlmProvider>, tools: ToolRegistry) -> Self {
        let cache = Arc::new(ResponseCache::new(
            config.cache.max_size,
            Duration::from_secs(config.cache.ttl_seconds),
        ));
        let templates = Arc::new(TemplateMatcher::from_config(&config.templates));
        let selector = Arc::new(KeywordToolSelector::new(tools.describe()));
        info!(
            "[AppState] {} tool(s), {} template(s), model {}",
            tools.len(),
            templates.len(),
            provider.model()
        );

        let orchestrator = GenerationOrchestrator::new(
            provider.clone(),
            Arc::new(tools),
            cache.clone(),
            OrchestratorConfig::from_app_config(&config),
        )
        .with_selector(selector)
        .with_templates(templates);

        Self {
            config,
            provider,
            cache,
            orchestrator,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.orchestrator
    }

    /// Check the backend and list its models.
    pub async fn health(&self) -> AppResult<Vec<String>> {
        self.provider.health_check().await?;
        Ok(self.provider.list_models().await?.unwrap_or_default())
    }
}
