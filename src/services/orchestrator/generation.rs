//! Generation Orchestrator
//!
//! Drives one request through the bounded generation loop:
//!
//! 1. Template match or cache hit answers immediately.
//! 2. Otherwise a round is opened against the backend. Text deltas go
//!    through the [`ToolCallDemux`] and passthrough text is forwarded as it
//!    arrives.
//! 3. At the end of the round the [`ToolCallExtractor`] yields the calls.
//!    No calls ends the request. Otherwise the calls run one at a time, their
//!    results are appended to the conversation and another round is opened,
//!    up to `max_iterations` rounds in total.
//!
//! Each request runs on its own task bound to a [`GenerationStream`];
//! dropping the stream cancels the task and the in-flight round with it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use qwen_chat_core::UnifiedStreamEvent;
use qwen_chat_llm::{
    GenerationOptions, LlmError, LlmProvider, Message, RoundRequest, ToolCall, ToolDefinition,
};
use qwen_chat_tools::{
    format_tool_error, ToolCallDemux, ToolCallExtractor, ToolExecutor, ToolSelector,
};

use super::conversation::{latest_user_text, optimal_max_tokens, prepare_messages};
use super::events::{backend_failure_text, ClientEvent, StreamEvent};
use crate::models::settings::AppConfig;
use crate::services::cache::ResponseCache;
use crate::services::templates::TemplateMatcher;

/// Buffered client events per request before the loop waits on the client.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Loop limits and sampling defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Maximum backend rounds per request
    pub max_iterations: usize,
    /// Maximum tools offered per request
    pub tool_top_k: usize,
    /// Conversation messages kept before the first round
    pub history_max_messages: usize,
    /// Overrides the built-in system prompt
    pub system_prompt: Option<String>,
    /// Sampling options before per-request adjustments
    pub options: GenerationOptions,
    /// Size `max_tokens` from the latest message
    pub adaptive_max_tokens: bool,
    /// Read and write the response cache
    pub cache_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            tool_top_k: 10,
            history_max_messages: 10,
            system_prompt: None,
            options: GenerationOptions::default(),
            adaptive_max_tokens: true,
            cache_enabled: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_iterations: config.orchestrator.max_iterations,
            tool_top_k: config.orchestrator.tool_top_k,
            history_max_messages: config.orchestrator.history_max_messages,
            system_prompt: config.orchestrator.system_prompt.clone(),
            options: config.generation.resolve(),
            adaptive_max_tokens: config.generation.uses_adaptive_max_tokens(),
            cache_enabled: config.cache.enabled,
        }
    }
}

/// One chat request.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    /// Per-request temperature override
    pub temperature: Option<f32>,
    /// Per-request output budget; disables adaptive sizing
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Live event stream of one request.
///
/// Owns the generation task. Dropping the stream cancels the task and
/// releases the backend connection.
pub struct GenerationStream {
    events: ReceiverStream<ClientEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl GenerationStream {
    /// Stop generating. Events already queued may still be delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain the stream into the final assistant text. A failure yields the
    /// error text.
    pub async fn collect_text(mut self) -> String {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            match event {
                ClientEvent::PartialText { content } | ClientEvent::Completion { content } => {
                    text.push_str(&content)
                }
                ClientEvent::Error { message } => return message,
            }
        }
        text
    }
}

impl Stream for GenerationStream {
    type Item = ClientEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// How a round ended.
enum RoundOutcome {
    Finished { text: String, calls: Vec<ToolCall> },
    Failed(LlmError),
    /// Cancelled or the client went away
    Aborted,
}

/// Sends projected events to the client and notices when it is gone.
struct EventSink {
    tx: mpsc::Sender<ClientEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Returns false when the client can no longer receive events.
    async fn emit(&self, event: StreamEvent) -> bool {
        let Some(client_event) = event.to_client() else {
            return true;
        };
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(client_event) => sent.is_ok(),
        }
    }
}

/// Streaming tool-augmented generation over an [`LlmProvider`].
#[derive(Clone)]
pub struct GenerationOrchestrator {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolExecutor>,
    selector: Option<Arc<dyn ToolSelector>>,
    cache: Arc<ResponseCache>,
    templates: Arc<TemplateMatcher>,
    config: OrchestratorConfig,
}

impl GenerationOrchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolExecutor>,
        cache: Arc<ResponseCache>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            selector: None,
            cache,
            templates: Arc::new(TemplateMatcher::empty()),
            config,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn ToolSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_templates(mut self, templates: Arc<TemplateMatcher>) -> Self {
        self.templates = templates;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Start a request and return its live event stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: GenerationRequest) -> GenerationStream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let sink = EventSink {
            tx,
            cancel: cancel.clone(),
        };
        let orchestrator = self.clone();
        let task = tokio::spawn(async move {
            orchestrator.run(request, sink).await;
        });

        GenerationStream {
            events: ReceiverStream::new(rx),
            cancel,
            task,
        }
    }

    /// Run a request to completion and return the final text.
    pub async fn generate_text(&self, request: GenerationRequest) -> String {
        self.start(request).collect_text().await
    }

    /// Tools offered for this request, in selector order.
    pub fn select_tools(&self, query: &str) -> Vec<ToolDefinition> {
        let Some(selector) = &self.selector else {
            return Vec::new();
        };
        let available = self.tools.describe();
        selector
            .select(query, self.config.tool_top_k)
            .iter()
            .filter_map(|name| available.iter().find(|t| &t.name == name).cloned())
            .take(self.config.tool_top_k)
            .collect()
    }

    /// Sampling options for this request.
    pub fn resolve_options(&self, request: &GenerationRequest) -> GenerationOptions {
        let mut options = self.config.options.clone();
        if let Some(temperature) = request.temperature {
            options.temperature = temperature;
        }
        match request.max_tokens {
            Some(max_tokens) => options.max_tokens = max_tokens,
            None if self.config.adaptive_max_tokens => {
                options.max_tokens = optimal_max_tokens(&request.messages, options.max_tokens);
            }
            None => {}
        }
        options
    }

    async fn run(&self, request: GenerationRequest, sink: EventSink) {
        let latest = latest_user_text(&request.messages).to_string();

        if let Some(text) = self.templates.match_text(&latest) {
            info!("[Orchestrator] Template match; skipping backend");
            sink.emit(StreamEvent::Done { content: text }).await;
            return;
        }

        if self.config.cache_enabled {
            if let Some(cached) = self.cache.lookup(&request.messages) {
                info!("[Orchestrator] Cache hit; skipping backend");
                sink.emit(StreamEvent::Done { content: cached }).await;
                return;
            }
        }

        let tools = self.select_tools(&latest);
        let options = self.resolve_options(&request);
        let mut messages = prepare_messages(
            &request.messages,
            self.config.history_max_messages,
            self.config.system_prompt.as_deref(),
            &tools,
        );
        info!(
            "[Orchestrator] Generating with {} ({} tool(s) offered, max_tokens={})",
            self.provider.model(),
            tools.len(),
            options.max_tokens
        );

        let mut accumulated = String::new();
        let mut rounds = 0usize;

        loop {
            rounds += 1;
            debug!(
                "[Orchestrator] Opening round {}/{}",
                rounds, self.config.max_iterations
            );

            let round = RoundRequest {
                messages: messages.clone(),
                tools: tools.clone(),
                options: options.clone(),
            };
            let (round_text, calls) = match self.run_round(round, &sink).await {
                RoundOutcome::Finished { text, calls } => (text, calls),
                RoundOutcome::Failed(e) => {
                    error!("[Orchestrator] Round {} failed: {}", rounds, e);
                    sink.emit(StreamEvent::Failed {
                        message: backend_failure_text(&e),
                    })
                    .await;
                    return;
                }
                RoundOutcome::Aborted => {
                    info!("[Orchestrator] Request cancelled during round {}", rounds);
                    return;
                }
            };
            accumulated.push_str(&round_text);

            if calls.is_empty() {
                break;
            }
            info!(
                "[Orchestrator] Round {} requested {} tool call(s)",
                rounds,
                calls.len()
            );
            sink.emit(StreamEvent::ToolCallsDetected {
                calls: calls.clone(),
            })
            .await;

            if rounds >= self.config.max_iterations {
                warn!(
                    "[Orchestrator] Iteration budget ({}) exhausted; skipping {} pending call(s)",
                    self.config.max_iterations,
                    calls.len()
                );
                break;
            }

            if !round_text.is_empty() {
                messages.push(Message::assistant(round_text));
            }
            if !self.execute_calls(calls, &mut messages, &sink).await {
                info!("[Orchestrator] Request cancelled during tool execution");
                return;
            }
        }

        if self.config.cache_enabled {
            self.cache.store(&request.messages, &accumulated);
        }
        info!("[Orchestrator] Completed after {} round(s)", rounds);
        sink.emit(StreamEvent::Done {
            content: String::new(),
        })
        .await;
    }

    /// Stream one round to the client and collect its tool calls.
    async fn run_round(&self, request: RoundRequest, sink: &EventSink) -> RoundOutcome {
        let mut stream = tokio::select! {
            _ = sink.cancel.cancelled() => return RoundOutcome::Aborted,
            opened = self.provider.open_round(request) => match opened {
                Ok(stream) => stream,
                Err(e) => return RoundOutcome::Failed(e),
            },
        };

        let mut demux = ToolCallDemux::new();
        let mut extractor = ToolCallExtractor::new();
        let mut text = String::new();

        loop {
            let next = tokio::select! {
                _ = sink.cancel.cancelled() => return RoundOutcome::Aborted,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(UnifiedStreamEvent::TextDelta { content })) => {
                    for piece in demux.feed(&content) {
                        text.push_str(&piece);
                        if !sink.emit(StreamEvent::Passthrough { text: piece }).await {
                            return RoundOutcome::Aborted;
                        }
                    }
                }
                Some(Ok(UnifiedStreamEvent::ToolComplete {
                    tool_name,
                    arguments,
                    ..
                })) => {
                    debug!("[Orchestrator] Structured tool call: {}", tool_name);
                    extractor.record_structured(tool_name, arguments);
                }
                Some(Ok(UnifiedStreamEvent::Usage {
                    input_tokens,
                    output_tokens,
                })) => {
                    debug!(
                        "[Orchestrator] Usage: {} prompt / {} completion tokens",
                        input_tokens, output_tokens
                    );
                }
                Some(Ok(UnifiedStreamEvent::Complete { stop_reason })) => {
                    debug!("[Orchestrator] Round complete ({:?})", stop_reason);
                    break;
                }
                Some(Ok(UnifiedStreamEvent::Error { message, .. })) => {
                    return RoundOutcome::Failed(LlmError::ServerError {
                        message,
                        status: None,
                    });
                }
                Some(Err(e)) => return RoundOutcome::Failed(e),
                None => break,
            }
        }
        // Dropping the stream here closes the backend connection.
        drop(stream);

        if let Some(rest) = demux.finish() {
            text.push_str(&rest);
            if !sink.emit(StreamEvent::Passthrough { text: rest }).await {
                return RoundOutcome::Aborted;
            }
        }
        extractor.record_inline(demux.take_tags());

        RoundOutcome::Finished {
            text,
            calls: extractor.finish(),
        }
    }

    /// Run calls in order, appending a call/result pair per call. Returns
    /// false if the request was cancelled.
    async fn execute_calls(
        &self,
        calls: Vec<ToolCall>,
        messages: &mut Vec<Message>,
        sink: &EventSink,
    ) -> bool {
        for call in calls {
            info!("[Orchestrator] Executing tool: {}", call.name);
            let result = tokio::select! {
                _ = sink.cancel.cancelled() => return false,
                result = self.tools.invoke(&call.name, call.arguments.clone()) => result,
            };

            if !result.success {
                warn!(
                    "[Orchestrator] Tool {} failed: {}",
                    call.name,
                    result.error_message()
                );
                let notice = format_tool_error(&call.name, result.error_message());
                if !sink.emit(StreamEvent::Passthrough { text: notice }).await {
                    return false;
                }
            }

            let content = result.to_content();
            let name = call.name.clone();
            messages.push(Message::assistant_tool_calls(vec![call]));
            messages.push(Message::tool_result(name, content));
        }
        true
    }
}
