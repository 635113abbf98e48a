//! Tests for process registration, interruption and cleanup.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use codex_bridge::bridge::{ProcessRegistry, Registration};
use codex_bridge::cli::{read_lines, CodexCommand, CodexProcess, LaunchOptions};

use super::fake_codex;

struct Running {
    _dir: tempfile::TempDir,
    registration: Registration,
    exit: JoinHandle<std::io::Result<ExitStatus>>,
}

/// Spawn a fake agent, wait for its first stdout line, and register it.
async fn start(registry: &Arc<ProcessRegistry>, channel: &str, body: &str) -> Running {
    let dir = tempfile::tempdir().unwrap();
    let path = fake_codex(&dir, body);
    let mut process = CodexProcess::spawn(
        path.to_str().unwrap(),
        &CodexCommand::new("task"),
        &LaunchOptions::default(),
    )
    .unwrap();

    let stdout = process.take_stdout().unwrap();
    let mut lines = Box::pin(read_lines(stdout));
    let first = tokio::time::timeout(Duration::from_secs(10), lines.next())
        .await
        .unwrap();
    assert!(first.is_some(), "fake agent printed nothing");
    tokio::spawn(async move { while lines.next().await.is_some() {} });

    let (registration, signals) = registry.register(channel, process.id()).unwrap();
    let exit = tokio::spawn(signals.supervise(process));
    Running {
        _dir: dir,
        registration,
        exit,
    }
}

#[tokio::test]
async fn interrupt_terminates_live_process() {
    let registry = Arc::new(ProcessRegistry::new(Duration::from_millis(500)));
    let running = start(&registry, "a", "echo ready\nexec sleep 30").await;
    assert!(registry.is_active("a"));

    assert!(registry.interrupt("a").await);
    assert!(running.registration.is_interrupted());

    let status = running.exit.await.unwrap().unwrap();
    assert_eq!(status.signal(), Some(15));

    drop(running.registration);
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn interrupt_force_kills_after_grace() {
    let registry = Arc::new(ProcessRegistry::new(Duration::from_millis(200)));
    let running = start(&registry, "a", "trap '' TERM\necho ready\nexec sleep 30").await;

    let started = Instant::now();
    assert!(registry.interrupt("a").await);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(running.registration.is_interrupted());

    let status = running.exit.await.unwrap().unwrap();
    assert_eq!(status.signal(), Some(9));
}

#[tokio::test]
async fn interrupt_after_natural_exit_is_noop() {
    let registry = Arc::new(ProcessRegistry::default());
    let running = start(&registry, "a", "echo done").await;

    let status = running.exit.await.unwrap().unwrap();
    assert!(status.success());

    assert!(!registry.interrupt("a").await);
    assert!(!running.registration.is_interrupted());
}

#[tokio::test]
async fn cleanup_all_kills_every_process() {
    let registry = Arc::new(ProcessRegistry::default());
    let first = start(&registry, "a", "echo ready\nexec sleep 30").await;
    let second = start(&registry, "b", "trap '' TERM\necho ready\nexec sleep 30").await;
    assert_eq!(registry.active_count(), 2);

    registry.cleanup_all().await;
    assert_eq!(registry.active_count(), 0);

    for running in [first, second] {
        let status = running.exit.await.unwrap().unwrap();
        assert_eq!(status.signal(), Some(9));
        assert!(!running.registration.is_interrupted());
    }
}
