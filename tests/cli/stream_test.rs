//! Tests for structured-stream reading.

use futures_util::StreamExt;

use codex_bridge::cli::{read_lines, CodexEvent, StreamError, StreamParser};

#[test]
fn parse_line_invalid_json() {
    let result = StreamParser::parse_line("not valid json at all");
    match result.unwrap_err() {
        StreamError::ParseError { input, reason } => {
            assert_eq!(input, "not valid json at all");
            assert!(!reason.is_empty());
        }
        StreamError::Io(e) => panic!("Expected ParseError, got {e}"),
    }
}

#[test]
fn parse_line_trims_whitespace() {
    let event = StreamParser::parse_line("  {\"type\":\"turn.started\"}\r").unwrap();
    assert_eq!(event, CodexEvent::TurnStarted {});
}

#[test]
fn parse_line_missing_required_field() {
    assert!(StreamParser::parse_line(r#"{"type":"thread.started"}"#).is_err());
}

#[tokio::test]
async fn read_lines_yields_every_line_in_order() {
    let input: &[u8] = b"{\"type\":\"turn.started\"}\n\nnot json\n{\"type\":\"turn.completed\"}\n";
    let lines: Vec<_> = read_lines(input).collect().await;
    assert_eq!(lines.len(), 4);

    let lines: Vec<_> = lines.into_iter().map(Result::unwrap).collect();
    assert!(matches!(lines[0].event, Some(Ok(CodexEvent::TurnStarted {}))));
    assert!(lines[1].event.is_none());
    assert_eq!(lines[1].raw, "");
    assert!(matches!(lines[2].event, Some(Err(StreamError::ParseError { .. }))));
    assert_eq!(lines[2].raw, "not json");
    assert!(matches!(
        lines[3].event,
        Some(Ok(CodexEvent::TurnCompleted { usage: None }))
    ));
}

#[tokio::test]
async fn read_lines_handles_missing_trailing_newline() {
    let input: &[u8] = b"{\"type\":\"thread.started\",\"thread_id\":\"abc\"}";
    let lines: Vec<_> = read_lines(input).collect().await;
    assert_eq!(lines.len(), 1);
    let line = lines.into_iter().next().unwrap().unwrap();
    assert_eq!(line.event.unwrap().unwrap().thread_id(), Some("abc"));
}

#[tokio::test]
async fn read_lines_empty_input() {
    let input: &[u8] = b"";
    let lines: Vec<_> = read_lines(input).collect().await;
    assert!(lines.is_empty());
}

#[tokio::test]
async fn read_lines_survives_invalid_utf8() {
    let input: &[u8] = b"{\"type\":\"turn.started\"}\n\xff\xfe garbage\n{\"type\":\"turn.completed\"}\n";
    let lines: Vec<_> = read_lines(input).collect().await;
    assert_eq!(lines.len(), 3);

    let lines: Vec<_> = lines.into_iter().map(Result::unwrap).collect();
    assert!(matches!(lines[1].event, Some(Err(StreamError::ParseError { .. }))));
    assert!(lines[1].raw.ends_with(" garbage"));
    assert!(matches!(
        lines[2].event,
        Some(Ok(CodexEvent::TurnCompleted { usage: None }))
    ));
}
