//! Orchestrator Integration Tests
//!
//! Drives full requests through `GenerationOrchestrator` against a scripted
//! backend:
//! - structured and inline tool rounds
//! - iteration budget against a backend that never stops calling tools
//! - backend and tool failures
//! - template and cache short-circuits
//! - cancellation when the client goes away

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;

use qwen_chat::services::{
    ClientEvent, GenerationRequest, ResponseCache, TemplateMatcher,
};
use qwen_chat::models::settings::TemplateSpec;
use qwen_chat_core::UnifiedStreamEvent;
use qwen_chat_llm::{LlmError, Message, MessageRole, ToolCall};
use qwen_chat_tools::{FunctionTool, KeywordToolSelector, ToolExecutor, ToolRegistry, ToolResult};

use crate::support::{
    complete, orchestrator, structured, test_tools, text, wait_for, DropFlag, RoundScript,
    ScriptedProvider,
};

// ============================================================================
// Tool rounds
// ============================================================================

#[tokio::test]
async fn test_open_youtube_scenario() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        RoundScript::Events(vec![
            structured("browser_navigate", json!({"url": "https://www.youtube.com"})),
            complete(),
        ]),
        RoundScript::Events(vec![text("done!"), complete()]),
    ]));
    let tools = test_tools();
    let calls = tools.calls.clone();
    let orch = orchestrator(provider.clone(), tools.registry);
    let messages = vec![Message::user("open youtube")];

    let events: Vec<ClientEvent> = orch
        .start(GenerationRequest::new(messages.clone()))
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            ClientEvent::PartialText {
                content: "done!".to_string()
            },
            ClientEvent::Completion {
                content: String::new()
            },
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.round_count(), 2);

    let second = &provider.requests()[1].messages;
    let tail = &second[second.len() - 2..];
    assert_eq!(
        tail[0].tool_calls,
        vec![ToolCall::new(
            "browser_navigate",
            json!({"url": "https://www.youtube.com"})
        )]
    );
    assert_eq!(tail[1].role, MessageRole::Tool);
    assert_eq!(tail[1].content, r#"{"navigated":"https://www.youtube.com"}"#);

    assert_eq!(orch.cache().lookup(&messages).as_deref(), Some("done!"));
}

#[tokio::test]
async fn test_inline_tag_split_across_chunks() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        RoundScript::Events(vec![
            text("Let me open YouTube for you.\n<tool_"),
            text("call name=\"browser_navigate\">{\"url\": \"https://www.you"),
            text("tube.com\"}</tool_call>"),
            complete(),
        ]),
        RoundScript::Events(vec![text(" It's open."), complete()]),
    ]));
    let tools = test_tools();
    let orch = orchestrator(provider.clone(), tools.registry);

    let output = orch
        .generate_text(GenerationRequest::new(vec![Message::user("open youtube")]))
        .await;

    assert_eq!(output, "Let me open YouTube for you.\n It's open.");
    assert!(!output.contains("tool_call"));
    assert_eq!(tools.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_structured_calls_override_inline_tags() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        RoundScript::Events(vec![
            text("<tool_call name=\"create_directory\">{\"path\": \"/tmp/x\"}</tool_call>"),
            structured("browser_navigate", json!({"url": "https://a.example"})),
            complete(),
        ]),
        RoundScript::Events(vec![text("ok"), complete()]),
    ]));
    let tools = test_tools();
    let orch = orchestrator(provider.clone(), tools.registry);

    orch.generate_text(GenerationRequest::new(vec![Message::user("go")]))
        .await;

    let second = &provider.requests()[1].messages;
    let called: Vec<&str> = second
        .iter()
        .flat_map(|m| m.tool_calls.iter().map(|c| c.name.as_str()))
        .collect();
    assert_eq!(called, vec!["browser_navigate"]);
}

#[tokio::test]
async fn test_multiple_calls_run_in_detection_order() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        RoundScript::Events(vec![
            structured("browser_navigate", json!({"url": "https://one.example"})),
            structured("browser_navigate", json!({"url": "https://two.example"})),
            complete(),
        ]),
        RoundScript::Events(vec![text("both open"), complete()]),
    ]));
    let tools = test_tools();
    let orch = orchestrator(provider.clone(), tools.registry);

    orch.generate_text(GenerationRequest::new(vec![Message::user("open both")]))
        .await;

    let second = &provider.requests()[1].messages;
    let pairs: Vec<(MessageRole, String)> = second
        .iter()
        .skip(2)
        .map(|m| {
            let detail = match m.role {
                MessageRole::Assistant => m.tool_calls[0].arguments["url"].to_string(),
                _ => m.content.clone(),
            };
            (m.role, detail)
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            (MessageRole::Assistant, "\"https://one.example\"".to_string()),
            (
                MessageRole::Tool,
                r#"{"navigated":"https://one.example"}"#.to_string()
            ),
            (MessageRole::Assistant, "\"https://two.example\"".to_string()),
            (
                MessageRole::Tool,
                r#"{"navigated":"https://two.example"}"#.to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_malformed_call_dropped_round_continues() {
    let provider = Arc::new(ScriptedProvider::new(vec![RoundScript::Events(vec![
        text("Trying <tool_call name=\"browser_navigate\">{url: nope}</tool_call>now."),
        complete(),
    ])]));
    let tools = test_tools();
    let orch = orchestrator(provider.clone(), tools.registry);

    let output = orch
        .generate_text(GenerationRequest::new(vec![Message::user("go")]))
        .await;

    assert_eq!(output, "Trying now.");
    assert_eq!(provider.round_count(), 1);
    assert_eq!(tools.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Iteration budget
// ============================================================================

#[tokio::test]
async fn test_adversarial_backend_opens_exactly_max_rounds() {
    let provider = Arc::new(ScriptedProvider::repeating(vec![
        text("again "),
        structured("browser_navigate", json!({"url": "https://loop.example"})),
        complete(),
    ]));
    let tools = test_tools();
    let calls = tools.calls.clone();
    let orch = orchestrator(provider.clone(), tools.registry);

    let events: Vec<ClientEvent> = orch
        .start(GenerationRequest::new(vec![Message::user("loop forever")]))
        .collect()
        .await;

    assert_eq!(provider.round_count(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        events.last(),
        Some(&ClientEvent::Completion {
            content: String::new()
        })
    );
    let partials = events
        .iter()
        .filter(|e| matches!(e, ClientEvent::PartialText { .. }))
        .count();
    assert_eq!(partials, 3);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_backend_unavailable_yields_one_error_event() {
    let provider = Arc::new(ScriptedProvider::new(vec![RoundScript::Refuse(
        LlmError::ProviderUnavailable {
            message: "connection refused".to_string(),
        },
    )]));
    let orch = orchestrator(provider.clone(), ToolRegistry::new());
    let messages = vec![Message::user("hello")];

    let events: Vec<ClientEvent> = orch
        .start(GenerationRequest::new(messages.clone()))
        .collect()
        .await;

    assert_eq!(
        events,
        vec![ClientEvent::Error {
            message:
                "I apologize, but I encountered an error: ProviderUnavailable: connection refused"
                    .to_string()
        }]
    );
    assert_eq!(provider.round_count(), 1);
    assert!(orch.cache().lookup(&messages).is_none());
}

#[tokio::test]
async fn test_failure_in_second_round_after_tool() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        RoundScript::Events(vec![
            structured("browser_navigate", json!({"url": "https://a.example"})),
            complete(),
        ]),
        RoundScript::Refuse(LlmError::Timeout {
            message: "round exceeded 300s".to_string(),
        }),
    ]));
    let tools = test_tools();
    let orch = orchestrator(provider, tools.registry);

    let output = orch
        .generate_text(GenerationRequest::new(vec![Message::user("open a")]))
        .await;

    assert_eq!(
        output,
        "I apologize, but I encountered an error: Timeout: round exceeded 300s"
    );
}

#[tokio::test]
async fn test_tool_error_is_inline_and_recorded() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        RoundScript::Events(vec![
            structured("create_directory", json!({"path": "/root/x"})),
            complete(),
        ]),
        RoundScript::Events(vec![text("I couldn't create it."), complete()]),
    ]));
    let tools = test_tools();
    let orch = orchestrator(provider.clone(), tools.registry);
    let messages = vec![Message::user("create folder x")];

    let events: Vec<ClientEvent> = orch
        .start(GenerationRequest::new(messages.clone()))
        .collect()
        .await;

    assert_eq!(
        events[0],
        ClientEvent::PartialText {
            content: "\n\n[Tool: create_directory encountered an error: permission denied]\n"
                .to_string()
        }
    );
    assert_eq!(events.len(), 3);

    let second = &provider.requests()[1].messages;
    let last = second.last().unwrap();
    assert_eq!(last.role, MessageRole::Tool);
    assert_eq!(last.tool_name.as_deref(), Some("create_directory"));
    assert_eq!(last.content, "Tool execution failed");

    assert_eq!(
        orch.cache().lookup(&messages).as_deref(),
        Some("I couldn't create it.")
    );
}

#[tokio::test]
async fn test_unknown_tool_is_a_failure() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        RoundScript::Events(vec![structured("teleport", json!({})), complete()]),
        RoundScript::Events(vec![text("no such tool"), complete()]),
    ]));
    let orch = orchestrator(provider.clone(), ToolRegistry::new());

    let output = orch
        .generate_text(GenerationRequest::new(vec![Message::user("teleport me")]))
        .await;

    assert!(output.starts_with("\n\n[Tool: teleport encountered an error: Unknown tool: teleport]\n"));
}

// ============================================================================
// Short-circuits
// ============================================================================

#[tokio::test]
async fn test_second_identical_request_served_from_cache() {
    let provider = Arc::new(ScriptedProvider::new(vec![RoundScript::Events(vec![
        text("Paris"),
        complete(),
    ])]));
    let orch = orchestrator(provider.clone(), ToolRegistry::new());
    let messages = vec![Message::user("capital of France?")];

    let first = orch.generate_text(GenerationRequest::new(messages.clone())).await;
    let second: Vec<ClientEvent> = orch
        .start(GenerationRequest::new(messages))
        .collect()
        .await;

    assert_eq!(first, "Paris");
    assert_eq!(
        second,
        vec![ClientEvent::Completion {
            content: "Paris".to_string()
        }]
    );
    assert_eq!(provider.round_count(), 1);
    assert_eq!(orch.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_template_match_bypasses_backend_and_cache() {
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let templates = TemplateMatcher::new(&[TemplateSpec {
        name: "greeting".to_string(),
        patterns: vec![r"^say hi$".to_string()],
        body: "Hi!".to_string(),
    }]);
    let orch = orchestrator(provider.clone(), ToolRegistry::new())
        .with_templates(Arc::new(templates));
    let messages = vec![Message::user("Say Hi")];
    orch.cache().store(&messages, "from cache");

    let events: Vec<ClientEvent> = orch
        .start(GenerationRequest::new(messages))
        .collect()
        .await;

    assert_eq!(
        events,
        vec![ClientEvent::Completion {
            content: "Here's what you asked for:\n\nHi!".to_string()
        }]
    );
    assert_eq!(provider.round_count(), 0);
}

#[tokio::test]
async fn test_cache_shared_between_orchestrators() {
    let cache = Arc::new(ResponseCache::new(10, Duration::from_secs(60)));
    let messages = vec![Message::user("shared?")];
    cache.store(&messages, "yes");

    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let orch = qwen_chat::services::GenerationOrchestrator::new(
        provider.clone(),
        Arc::new(ToolRegistry::new()),
        cache,
        Default::default(),
    );

    assert_eq!(orch.generate_text(GenerationRequest::new(messages)).await, "yes");
    assert_eq!(provider.round_count(), 0);
}

// ============================================================================
// Tool selection
// ============================================================================

#[tokio::test]
async fn test_only_selected_tools_are_offered() {
    let provider = Arc::new(ScriptedProvider::new(vec![RoundScript::Events(vec![
        text("ok"),
        complete(),
    ])]));
    let tools = test_tools();
    let selector = Arc::new(KeywordToolSelector::new(tools.registry.describe()));
    let orch = orchestrator(provider.clone(), tools.registry).with_selector(selector);

    orch.generate_text(GenerationRequest::new(vec![Message::user(
        "please create a directory called test",
    )]))
    .await;

    let request = &provider.requests()[0];
    let offered: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(offered, vec!["create_directory"]);
    let system = &request.messages[0];
    assert_eq!(system.role, MessageRole::System);
    assert!(system.content.contains("**AVAILABLE TOOLS FOR THIS REQUEST:**"));
    assert!(!system.content.contains("browser_navigate:"));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_dropping_stream_abandons_backend_round() {
    let provider = Arc::new(ScriptedProvider::new(vec![RoundScript::Stall(vec![text(
        "thinking...",
    )])]));
    let dropped = provider.stream_dropped.clone();
    let orch = orchestrator(provider.clone(), ToolRegistry::new());
    let messages = vec![Message::user("long answer please")];

    let mut stream = orch.start(GenerationRequest::new(messages.clone()));
    assert_eq!(
        stream.next().await,
        Some(ClientEvent::PartialText {
            content: "thinking...".to_string()
        })
    );
    assert!(!dropped.load(Ordering::SeqCst));

    drop(stream);
    wait_for(&dropped).await;
    assert!(orch.cache().lookup(&messages).is_none());
}

#[tokio::test]
async fn test_cancel_stops_stream_without_completion() {
    let provider = Arc::new(ScriptedProvider::new(vec![RoundScript::Stall(vec![text(
        "partial",
    )])]));
    let dropped = provider.stream_dropped.clone();
    let orch = orchestrator(provider, ToolRegistry::new());

    let mut stream = orch.start(GenerationRequest::new(vec![Message::user("hi")]));
    assert!(stream.next().await.is_some());

    stream.cancel();
    wait_for(&dropped).await;
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn test_dropping_stream_abandons_running_tool() {
    let started = Arc::new(AtomicBool::new(false));
    let released = Arc::new(AtomicBool::new(false));

    let mut registry = ToolRegistry::new();
    let (started_flag, released_flag) = (started.clone(), released.clone());
    registry.register(Arc::new(FunctionTool::new(
        "slow",
        "Never finishes",
        json!({"type": "object"}),
        move |_| {
            let started = started_flag.clone();
            let guard = DropFlag(released_flag.clone());
            Box::pin(async move {
                let _guard = guard;
                started.store(true, Ordering::SeqCst);
                futures_util::future::pending::<()>().await;
                ToolResult::ok(json!(null))
            })
        },
    )));

    let provider = Arc::new(ScriptedProvider::new(vec![RoundScript::Events(vec![
        structured("slow", json!({})),
        complete(),
    ])]));
    let orch = orchestrator(provider.clone(), registry);

    let stream = orch.start(GenerationRequest::new(vec![Message::user("run slow")]));
    wait_for(&started).await;
    drop(stream);
    wait_for(&released).await;
    assert_eq!(provider.round_count(), 1);
}

#[tokio::test]
async fn test_in_stream_error_after_partial_text() {
    let provider = Arc::new(ScriptedProvider::new(vec![RoundScript::Events(vec![
        text("Hel"),
        UnifiedStreamEvent::Error {
            message: "model crashed".to_string(),
            code: None,
        },
    ])]));
    let orch = orchestrator(provider, ToolRegistry::new());

    let events: Vec<ClientEvent> = orch
        .start(GenerationRequest::new(vec![Message::user("hello")]))
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].content(), "Hel");
    assert!(events[1].is_terminal());
    assert!(events[1].content().ends_with("ServerError: model crashed"));
}
