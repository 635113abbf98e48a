//! Tests for folding parsed stream lines into a result.

use codex_bridge::bridge::{EventReducer, MessageKind, Notification};
use codex_bridge::cli::StreamParser;

/// Feed raw lines through the parser and reducer the way the runner does.
fn reduce(lines: &[&str]) -> (Vec<Notification>, EventReducer) {
    let mut reducer = EventReducer::new();
    let mut notes = Vec::new();
    for raw in lines {
        let line = StreamParser::classify((*raw).to_string());
        reducer.record_raw(&line.raw);
        if let Some(Ok(event)) = line.event {
            notes.extend(reducer.apply(&event));
        }
    }
    (notes, reducer)
}

#[test]
fn full_turn_produces_ordered_notifications() {
    let (notes, reducer) = reduce(&[
        r#"{"type":"thread.started","thread_id":"abc"}"#,
        r#"{"type":"turn.started"}"#,
        r#"{"type":"item.started","item":{"type":"reasoning"}}"#,
        r#"{"type":"item.completed","item":{"type":"agent_message","text":"hi"}}"#,
        r#"{"type":"turn.completed"}"#,
    ]);

    assert_eq!(
        notes,
        vec![
            Notification::Message(MessageKind::SessionId, "abc".to_string()),
            Notification::Message(MessageKind::MessageStart, String::new()),
            Notification::Message(MessageKind::Content, "hi".to_string()),
            Notification::Message(MessageKind::MessageEnd, String::new()),
        ]
    );

    let result = reducer.finish(0, false);
    assert!(result.success);
    assert_eq!(result.thread_id.as_deref(), Some("abc"));
    assert_eq!(result.final_result, "hi");
    assert!(result.usage.is_none());
}

#[test]
fn malformed_line_between_messages_is_skipped() {
    let (notes, reducer) = reduce(&[
        r#"{"type":"item.completed","item":{"type":"agent_message","text":"one "}}"#,
        r#"{"type":"item.completed","item":"#,
        r#"{"type":"item.completed","item":{"type":"agent_message","text":"two"}}"#,
    ]);

    assert!(notes.iter().all(|n| !matches!(n, Notification::Error(_))));
    let result = reducer.finish(0, false);
    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.final_result, "one two");
    assert_eq!(result.message_count, 2);
    assert!(result.raw_output.contains(r#"{"type":"item.completed","item":"#));
}

#[test]
fn usage_counters_are_copied() {
    let (_, reducer) = reduce(&[
        r#"{"type":"turn.completed","usage":{"input_tokens":10,"cached_input_tokens":2,"output_tokens":5}}"#,
    ]);
    let usage = reducer.finish(0, false).usage.unwrap();
    assert_eq!(usage.input_tokens, 10);
    assert_eq!(usage.cached_input_tokens, 2);
    assert_eq!(usage.output_tokens, 5);
}

#[test]
fn missing_usage_counter_is_zero() {
    let (_, reducer) = reduce(&[r#"{"type":"turn.completed","usage":{"input_tokens":10}}"#]);
    let usage = reducer.finish(0, false).usage.unwrap();
    assert_eq!(usage.input_tokens, 10);
    assert_eq!(usage.cached_input_tokens, 0);
    assert_eq!(usage.output_tokens, 0);
}

#[test]
fn error_event_without_message_uses_fallback() {
    let (notes, reducer) = reduce(&[r#"{"type":"error"}"#]);
    assert_eq!(notes, vec![Notification::Error("Unknown error".to_string())]);
    assert_eq!(
        reducer.finish(1, false).error.as_deref(),
        Some("Unknown error")
    );
}

#[test]
fn unknown_events_change_nothing() {
    let (notes, reducer) = reduce(&[
        r#"{"type":"session.configured","model":"gpt-5"}"#,
        r#"{"thread_id":"no type field"}"#,
        "",
    ]);
    assert!(notes.is_empty());
    let result = reducer.finish(0, false);
    assert!(result.success);
    assert!(result.thread_id.is_none());
    assert_eq!(result.raw_output.lines().count(), 3);
}
