//! Bridge module tests.

mod reducer_test;
#[cfg(unix)]
mod registry_test;

use std::path::PathBuf;
use std::time::Duration;

use codex_bridge::bridge::BridgeMessage;
use tokio::sync::mpsc::UnboundedReceiver;

/// Write an executable `/bin/sh` script named `codex` into `dir`.
#[cfg(unix)]
pub fn fake_codex(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("codex");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Shell snippet printing `lines` verbatim to stdout.
pub fn emit(lines: &[&str]) -> String {
    format!("cat <<'JSONL'\n{}\nJSONL\n", lines.join("\n"))
}

/// Receive the next notification or fail after ten seconds.
pub async fn next_message(rx: &mut UnboundedReceiver<BridgeMessage>) -> BridgeMessage {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for a bridge message")
        .expect("callback channel closed")
}

/// Drain every notification already delivered.
pub fn drain(rx: &mut UnboundedReceiver<BridgeMessage>) -> Vec<BridgeMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

/// Verify the public bridge types are exported from the library.
#[test]
fn test_all_bridge_types_exported() {
    use codex_bridge::bridge::{
        Attachment, BridgeError, ChannelCallback, ChannelInfo, CliResult, CodexBridge,
        EventReducer, LastSession, MessageKind, MessageRequest, ProcessRegistry, RegistryError,
    };

    let _ = CodexBridge::new();
    let _ = EventReducer::new();
    let _ = LastSession::new();
    let _ = ProcessRegistry::default();
    let _ = ChannelCallback::channel();
    let _ = MessageRequest::new("c", "task").attachments(vec![Attachment::default()]);
    let _ = CliResult::failed("x");
    let _ = MessageKind::Content;
    let _: fn(ChannelInfo) -> bool = |info| info.success;
    let _: fn() -> BridgeError = || BridgeError::NoStdout;
    let _: fn() -> RegistryError = || RegistryError::ChannelBusy {
        channel: "c".to_string(),
    };
}
