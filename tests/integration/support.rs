//! Shared fixtures: a scripted backend and counting tools.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

use qwen_chat::services::{GenerationOrchestrator, OrchestratorConfig, ResponseCache};
use qwen_chat_core::UnifiedStreamEvent;
use qwen_chat_llm::{LlmError, LlmProvider, LlmResult, RoundRequest, RoundStream};
use qwen_chat_tools::{FunctionTool, ToolRegistry, ToolResult};

/// How a scripted round behaves after its events are exhausted.
#[derive(Clone)]
pub enum RoundScript {
    /// Emit the events, then end the stream
    Events(Vec<UnifiedStreamEvent>),
    /// Emit the events, then never produce another item
    Stall(Vec<UnifiedStreamEvent>),
    /// Fail to open the round
    Refuse(LlmError),
}

/// Sets its flag when dropped.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Backend that replays one script per round and records every request.
pub struct ScriptedProvider {
    rounds: Mutex<VecDeque<RoundScript>>,
    fallback: Option<RoundScript>,
    requests: Mutex<Vec<RoundRequest>>,
    /// Set when a stalled round's stream is dropped
    pub stream_dropped: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(rounds: Vec<RoundScript>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every round replays the given events.
    pub fn repeating(events: Vec<UnifiedStreamEvent>) -> Self {
        Self {
            fallback: Some(RoundScript::Events(events)),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<RoundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn round_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn open_round(&self, request: RoundRequest) -> LlmResult<RoundStream> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .rounds
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| {
                RoundScript::Refuse(LlmError::ProviderUnavailable {
                    message: "no more scripted rounds".to_string(),
                })
            });

        match script {
            RoundScript::Events(events) => {
                let stream: RoundStream =
                    Box::pin(futures_util::stream::iter(events.into_iter().map(Ok)));
                Ok(stream)
            }
            RoundScript::Stall(events) => {
                let guard = DropFlag(self.stream_dropped.clone());
                let stream = futures_util::stream::iter(events.into_iter().map(Ok))
                    .chain(futures_util::stream::pending())
                    .map(move |item| {
                        let _keep = &guard;
                        item
                    });
                let stream: RoundStream = Box::pin(stream);
                Ok(stream)
            }
            RoundScript::Refuse(err) => Err(err),
        }
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }
}

pub fn text(content: &str) -> UnifiedStreamEvent {
    UnifiedStreamEvent::TextDelta {
        content: content.to_string(),
    }
}

pub fn structured(name: &str, arguments: Value) -> UnifiedStreamEvent {
    UnifiedStreamEvent::ToolComplete {
        tool_id: format!("call_{}", name),
        tool_name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

pub fn complete() -> UnifiedStreamEvent {
    UnifiedStreamEvent::Complete {
        stop_reason: Some("stop".to_string()),
    }
}

/// Tools used across tests, with a shared invocation counter.
pub struct TestTools {
    pub registry: ToolRegistry,
    pub calls: Arc<AtomicUsize>,
}

pub fn test_tools() -> TestTools {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();

    let counter = calls.clone();
    registry.register(Arc::new(FunctionTool::new(
        "browser_navigate",
        "Open a web page in the browser",
        json!({"type": "object", "properties": {"url": {"type": "string"}}}),
        move |args| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ToolResult::ok(json!({"navigated": args["url"]}))
            })
        },
    )));

    let counter = calls.clone();
    registry.register(Arc::new(FunctionTool::new(
        "create_directory",
        "Create a directory on disk",
        json!({"type": "object", "properties": {"path": {"type": "string"}}}),
        move |_| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ToolResult::err("permission denied")
            })
        },
    )));

    TestTools { registry, calls }
}

pub fn orchestrator(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> GenerationOrchestrator {
    GenerationOrchestrator::new(
        provider,
        Arc::new(tools),
        Arc::new(ResponseCache::new(100, Duration::from_secs(3600))),
        OrchestratorConfig::default(),
    )
}

/// Wait until `flag` is set, failing the test after two seconds.
pub async fn wait_for(flag: &AtomicBool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("flag was never set");
}
