//! CLI module tests.

mod process_test;
mod stream_test;

/// Verify the public CLI types are exported from the library.
#[test]
fn test_all_cli_types_exported() {
    use codex_bridge::cli::{
        CodexCommand, CodexEvent, LaunchOptions, SpawnError, StreamError,
        StreamParser, ThreadItem, Usage,
    };

    let _ = CodexCommand::new("task");
    let _ = LaunchOptions::default();
    let _ = ThreadItem::default();
    let _ = Usage::default();
    let _: fn(&str) -> Result<CodexEvent, StreamError> = StreamParser::parse_line;
    let _: fn() -> SpawnError = || SpawnError::NotFound("codex".to_string());
}
