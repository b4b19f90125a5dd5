//! Stream Parsing Integration Tests
//!
//! Feeds realistic chunk sequences through `ToolCallDemux` and
//! `ToolCallExtractor` together, the way one backend round does.

use serde_json::json;

use qwen_chat_llm::ToolCall;
use qwen_chat_tools::{ToolCallDemux, ToolCallExtractor};

/// Runs one round: returns the passthrough text and the extracted calls.
fn run_round(chunks: &[&str], structured: &[(&str, &str)]) -> (String, Vec<ToolCall>) {
    let mut demux = ToolCallDemux::new();
    let mut extractor = ToolCallExtractor::new();
    let mut text = String::new();

    for chunk in chunks {
        for piece in demux.feed(chunk) {
            text.push_str(&piece);
        }
    }
    for (name, arguments) in structured {
        extractor.record_structured(*name, *arguments);
    }
    if let Some(rest) = demux.finish() {
        text.push_str(&rest);
    }
    extractor.record_inline(demux.take_tags());
    (text, extractor.finish())
}

#[test]
fn test_three_chunk_tag_is_hidden_and_extracted() {
    let (text, calls) = run_round(
        &[
            "Opening it now. <tool_call name=\"browser_navigate\">",
            "{\"url\": \"https://www.you",
            "tube.com\"}</tool_call> Enjoy!",
        ],
        &[],
    );

    assert_eq!(text, "Opening it now.  Enjoy!");
    assert_eq!(
        calls,
        vec![ToolCall::new(
            "browser_navigate",
            json!({"url": "https://www.youtube.com"})
        )]
    );
}

#[test]
fn test_every_split_point_gives_same_round() {
    let round = "Sure.<tool_call name=\"create_directory\">{\"path\": \"/tmp/demo\"}</tool_call>\
                 Then <tool_call name=\"browser_navigate\">{\"url\": \"https://a.example\"}</tool_call>done.";
    let (whole_text, whole_calls) = run_round(&[round], &[]);
    assert_eq!(whole_text, "Sure.Then done.");
    assert_eq!(whole_calls.len(), 2);

    for first in 0..=round.len() {
        for second in (first..=round.len()).step_by(7) {
            let chunks = [&round[..first], &round[first..second], &round[second..]];
            let (text, calls) = run_round(&chunks, &[]);
            assert_eq!(text, whole_text, "splits at {} and {}", first, second);
            assert_eq!(calls, whole_calls, "splits at {} and {}", first, second);
        }
    }
}

#[test]
fn test_single_character_chunks() {
    let round = "a <b> <tool_call name=\"x\">{\"k\": [1, 2]}</tool_call> <tool";
    let chunks: Vec<String> = round.chars().map(String::from).collect();
    let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();

    let (text, calls) = run_round(&chunk_refs, &[]);

    assert_eq!(text, "a <b>  <tool");
    assert_eq!(calls, vec![ToolCall::new("x", json!({"k": [1, 2]}))]);
}

#[test]
fn test_structured_calls_win_over_inline_tags() {
    let (text, calls) = run_round(
        &["<tool_call name=\"inline_tool\">{}</tool_call>visible"],
        &[("browser_navigate", r#"{"url": "https://www.youtube.com"}"#)],
    );

    // The inline span is still hidden from the user.
    assert_eq!(text, "visible");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "browser_navigate");
}

#[test]
fn test_unclosed_tag_is_neither_shown_nor_called() {
    let (text, calls) = run_round(&["Let me try ", "<tool_call name=\"x\">{\"a\": 1"], &[]);

    assert_eq!(text, "Let me try ");
    assert!(calls.is_empty());
}

#[test]
fn test_malformed_tag_dropped_valid_tag_kept() {
    let (text, calls) = run_round(
        &[
            "<tool_call name=\"first\">not json</tool_call>",
            "<tool_call name=\"second\">{\"ok\": true}</tool_call>",
        ],
        &[],
    );

    assert!(text.is_empty());
    assert_eq!(calls, vec![ToolCall::new("second", json!({"ok": true}))]);
}

#[test]
fn test_non_ascii_text_around_tags() {
    let round = "Voilà, <tool_call name=\"echo\">{\"msg\": \"héllo\"}</tool_call>ça marche ✓";
    for split in (0..=round.len()).filter(|&i| round.is_char_boundary(i)) {
        let (text, calls) = run_round(&[&round[..split], &round[split..]], &[]);
        assert_eq!(text, "Voilà, ça marche ✓", "split at {}", split);
        assert_eq!(calls, vec![ToolCall::new("echo", json!({"msg": "héllo"}))]);
    }
}
