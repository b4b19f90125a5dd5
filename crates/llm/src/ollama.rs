//! Ollama Provider
//!
//! Streams chat rounds from a local Ollama server over its native
//! `/api/chat` NDJSON endpoint. Every recognised sampling option is sent,
//! including the tail-free and typical sampling factors and the keep-alive hint.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::http_client::build_http_client;
use crate::provider::{parse_http_error, LlmProvider, RoundRequest, RoundStream};
use crate::streaming_adapters::OllamaAdapter;
use crate::types::{LlmError, LlmResult, Message, ProviderConfig, ToolDefinition};
use qwen_chat_core::streaming::{StreamAdapter, UnifiedStreamEvent};

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Ollama backend provider
pub struct OllamaProvider {
    config: ProviderConfig,
    base_url: Url,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| LlmError::InvalidRequest {
            message: format!("invalid base URL {}: {}", config.base_url, e),
        })?;
        let client = build_http_client(&config)?;
        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    /// Get the configuration for this provider.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> LlmResult<Url> {
        self.base_url.join(path).map_err(|e| LlmError::InvalidRequest {
            message: format!("invalid endpoint {}: {}", path, e),
        })
    }

    fn message_to_wire(message: &Message) -> Value {
        let mut wire = json!({
            "role": message.role.as_str(),
            "content": message.content,
        });
        if !message.tool_calls.is_empty() {
            wire["tool_calls"] = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments,
                        }
                    })
                })
                .collect();
        }
        if let Some(name) = &message.tool_name {
            wire["tool_name"] = json!(name);
        }
        wire
    }

    fn tool_to_wire(tool: &ToolDefinition) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        })
    }

    /// Build the `/api/chat` request body
    fn build_request_body(&self, request: &RoundRequest) -> Value {
        let options = &request.options;
        let mut body = json!({
            "model": self.config.model,
            "messages": request.messages.iter().map(Self::message_to_wire).collect::<Vec<_>>(),
            "stream": true,
            "keep_alive": options.keep_alive,
            "options": {
                "temperature": options.temperature,
                "num_predict": options.max_tokens,
                "num_ctx": options.context_window,
                "top_k": options.top_k,
                "top_p": options.top_p,
                "repeat_penalty": options.repeat_penalty,
                "tfs_z": options.tfs_z,
                "typical_p": options.typical_p,
            },
        });
        if !request.tools.is_empty() {
            body["tools"] = request.tools.iter().map(Self::tool_to_wire).collect();
        }
        body
    }

    async fn fetch_tags(&self) -> LlmResult<TagsResponse> {
        let response = self
            .client
            .get(self.endpoint("/api/tags")?)
            .send()
            .await
            .map_err(LlmError::from_reqwest)?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &body, "ollama"));
        }

        response.json().await.map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })
    }
}

/// Line-buffered state of one NDJSON round.
struct RoundState {
    body: ByteStream,
    buffer: Vec<u8>,
    adapter: OllamaAdapter,
    pending: VecDeque<UnifiedStreamEvent>,
    finished: bool,
}

impl RoundState {
    fn push_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        if line.trim().is_empty() {
            return;
        }
        match self.adapter.adapt(&line) {
            Ok(events) => self.pending.extend(events),
            Err(e) => warn!("[Ollama] Skipping unparseable stream line: {}", e),
        }
    }

    /// Move every complete line out of the byte buffer.
    ///
    /// Splitting on raw bytes keeps multi-byte characters intact when a
    /// network chunk ends mid-character.
    fn drain_lines(&mut self) {
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            self.push_line(&line[..line.len() - 1]);
        }
    }

    async fn next_event(&mut self) -> Option<LlmResult<UnifiedStreamEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if event.is_terminal() {
                    self.finished = true;
                    self.pending.clear();
                }
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            match self.body.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.drain_lines();
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(LlmError::from_reqwest(e)));
                }
                None => {
                    let rest = std::mem::take(&mut self.buffer);
                    self.push_line(&rest);
                    if !self.pending.iter().any(UnifiedStreamEvent::is_terminal) {
                        self.pending.push_back(UnifiedStreamEvent::Error {
                            message: "stream ended before the round completed".to_string(),
                            code: None,
                        });
                    }
                }
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn open_round(&self, request: RoundRequest) -> LlmResult<RoundStream> {
        let body = self.build_request_body(&request);
        debug!(
            "[Ollama] Opening round: model={} messages={} tools={}",
            self.config.model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(self.endpoint("/api/chat")?)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from_reqwest)?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.map_err(LlmError::from_reqwest)?;
            return Err(parse_http_error(status, &body_text, "ollama"));
        }

        let state = RoundState {
            body: response.bytes_stream().boxed(),
            buffer: Vec::new(),
            adapter: OllamaAdapter::new(&self.config.model),
            pending: VecDeque::new(),
            finished: false,
        };

        let stream = futures_util::stream::unfold(state, |mut state| async move {
            let item = state.next_event().await;
            item.map(|item| (item, state))
        });
        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> LlmResult<()> {
        match self.fetch_tags().await {
            Ok(_) => Ok(()),
            Err(LlmError::NetworkError { message }) => {
                Err(LlmError::ProviderUnavailable { message })
            }
            Err(e) => Err(e),
        }
    }

    async fn list_models(&self) -> LlmResult<Option<Vec<String>>> {
        let tags = self.fetch_tags().await?;
        Ok(Some(tags.models.into_iter().map(|m| m.name).collect()))
    }
}
