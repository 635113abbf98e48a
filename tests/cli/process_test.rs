//! Tests for Codex argument building and process spawning.

use codex_bridge::cli::{CodexCommand, CodexProcess, LaunchOptions, SpawnError};

fn has_pair(args: &[String], first: &str, second: &str) -> bool {
    args.windows(2).any(|w| w[0] == first && w[1] == second)
}

#[test]
fn builder_minimal_args() {
    let args = CodexCommand::new("Fix the bug").build_args();
    assert_eq!(
        args,
        vec![
            "exec",
            "--json",
            "--full-auto",
            "--skip-git-repo-check",
            "Fix the bug"
        ]
    );
}

#[test]
fn builder_task_is_last() {
    let args = CodexCommand::new("the task")
        .model(Some("gpt-5"))
        .resume_last(true)
        .build_args();
    assert_eq!(args.last().map(String::as_str), Some("the task"));
}

#[test]
fn builder_model_only_when_non_empty() {
    let args = CodexCommand::new("task").model(Some("o3")).build_args();
    assert!(has_pair(&args, "--model", "o3"));

    let args = CodexCommand::new("task").model(Some("")).build_args();
    assert!(!args.contains(&"--model".to_string()));

    let args = CodexCommand::new("task").model(None).build_args();
    assert!(!args.contains(&"--model".to_string()));
}

#[test]
fn builder_explicit_resume_wins_over_last() {
    let args = CodexCommand::new("task")
        .resume(Some("t-1"))
        .resume_last(true)
        .build_args();
    assert!(has_pair(&args, "resume", "t-1"));
    assert!(!args.contains(&"--last".to_string()));
}

#[test]
fn builder_sentinel_resume_falls_back_to_last() {
    for token in ["", "undefined", "null"] {
        let args = CodexCommand::new("task")
            .resume(Some(token))
            .resume_last(true)
            .build_args();
        assert!(has_pair(&args, "resume", "--last"), "token {token:?}");
    }
}

#[test]
fn builder_no_resume_without_last_session() {
    let args = CodexCommand::new("task").resume(Some("null")).build_args();
    assert!(!args.contains(&"resume".to_string()));
}

#[test]
fn builder_permission_modes() {
    let full = CodexCommand::new("task").permission_mode(Some("full-auto"));
    assert!(full.build_args().contains(&"--full-auto".to_string()));

    let other = CodexCommand::new("task").permission_mode(Some("read-only"));
    assert!(!other.build_args().contains(&"--full-auto".to_string()));
}

#[test]
fn launch_options_collect_env() {
    let options = LaunchOptions::default()
        .env("CODEX_API_KEY", "sk-1")
        .env("OTHER", "x");
    assert_eq!(options.env.len(), 2);
    assert_eq!(options.env[0], ("CODEX_API_KEY".to_string(), "sk-1".to_string()));
}

#[tokio::test]
async fn spawn_missing_binary_is_not_found() {
    let err = CodexProcess::spawn(
        "/definitely/not/here/codex",
        &CodexCommand::new("task"),
        &LaunchOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SpawnError::NotFound(_)));
    assert!(err.to_string().contains("/definitely/not/here/codex"));
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_non_executable_is_permission_denied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codex");
    std::fs::write(&path, "#!/bin/sh\n").unwrap();

    let err = CodexProcess::spawn(
        path.to_str().unwrap(),
        &CodexCommand::new("task"),
        &LaunchOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SpawnError::PermissionDenied(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn graceful_terminate_stops_process() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codex");
    std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut process = CodexProcess::spawn(
        path.to_str().unwrap(),
        &CodexCommand::new("task"),
        &LaunchOptions::default(),
    )
    .unwrap();
    assert!(process.id().is_some());
    assert!(process.try_wait().unwrap().is_none());

    process
        .graceful_terminate(Duration::from_secs(2))
        .await
        .unwrap();
    let status = process.wait().await.unwrap();
    assert!(!status.success());
}
