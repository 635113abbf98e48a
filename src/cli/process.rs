//! Codex CLI process spawning and control.
//!
//! This module provides a builder for the `codex exec` argument vector and
//! a thin wrapper around the spawned child with termination helpers.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Permission mode that maps to `--full-auto`.
pub const FULL_AUTO: &str = "full-auto";

/// Placeholder strings hosts send in place of a missing value.
const SENTINELS: [&str; 2] = ["undefined", "null"];

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Codex binary not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(binary: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(binary.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(binary.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Returns the value unless it is empty or a host placeholder.
#[must_use]
pub fn usable(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty() && !SENTINELS.contains(v))
}

/// Builder for `codex exec` arguments.
#[derive(Debug, Clone, Default)]
pub struct CodexCommand {
    task: String,
    resume_token: Option<String>,
    model: Option<String>,
    permission_mode: Option<String>,
    resume_last: bool,
}

impl CodexCommand {
    /// Create a new builder for the given task text.
    #[must_use]
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    /// Resume an explicit thread.
    ///
    /// Empty strings and the placeholders `"undefined"` / `"null"` are ignored.
    #[must_use]
    pub fn resume(mut self, token: Option<&str>) -> Self {
        self.resume_token = usable(token).map(ToString::to_string);
        self
    }

    /// Fall back to `resume --last` when no explicit token is set.
    #[must_use]
    pub fn resume_last(mut self, enabled: bool) -> Self {
        self.resume_last = enabled;
        self
    }

    /// Select a model. Empty strings are ignored.
    #[must_use]
    pub fn model(mut self, model: Option<&str>) -> Self {
        self.model = model.filter(|m| !m.is_empty()).map(ToString::to_string);
        self
    }

    /// Set the permission mode. Empty strings count as unset.
    #[must_use]
    pub fn permission_mode(mut self, mode: Option<&str>) -> Self {
        self.permission_mode = mode.filter(|m| !m.is_empty()).map(ToString::to_string);
        self
    }

    /// Get the task text.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Returns true when the command runs with `--full-auto`.
    #[must_use]
    pub fn is_full_auto(&self) -> bool {
        matches!(self.permission_mode.as_deref(), None | Some(FULL_AUTO))
    }

    /// Build the command-line arguments (without the executable).
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["exec".to_string(), "--json".to_string()];

        if self.is_full_auto() {
            args.push("--full-auto".to_string());
        }

        args.push("--skip-git-repo-check".to_string());

        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        if let Some(token) = &self.resume_token {
            args.push("resume".to_string());
            args.push(token.clone());
        } else if self.resume_last {
            args.push("resume".to_string());
            args.push("--last".to_string());
        }

        args.push(self.task.clone());
        args
    }
}

/// Launch options that do not affect the argument vector.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Working directory; ignored unless it is an existing directory.
    pub working_dir: Option<PathBuf>,
    /// Environment variables injected into the child.
    pub env: Vec<(String, String)>,
}

impl LaunchOptions {
    /// Set the working directory from a host-supplied string.
    ///
    /// Empty strings, placeholders and paths that are not directories are
    /// dropped.
    #[must_use]
    pub fn working_dir(mut self, dir: Option<&str>) -> Self {
        self.working_dir = usable(dir).map(PathBuf::from).filter(|p| {
            let ok = p.is_dir();
            if !ok {
                tracing::debug!(path = %p.display(), "Ignoring working directory that is not a directory");
            }
            ok
        });
        self
    }

    /// Add an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Get the working directory, if set.
    #[must_use]
    pub fn get_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

/// A running Codex CLI process.
#[derive(Debug)]
pub struct CodexProcess {
    child: Child,
}

impl CodexProcess {
    /// Spawn `binary` with the builder's arguments and the launch options.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(
        binary: &str,
        command: &CodexCommand,
        options: &LaunchOptions,
    ) -> Result<Self, SpawnError> {
        let args = command.build_args();

        let mut cmd = Command::new(binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &options.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| SpawnError::from_io(binary, e))?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        if let Err(errno) = kill(nix_pid, Signal::SIGTERM) {
            tracing::debug!(pid, %errno, "SIGTERM failed, killing");
            return self.child.kill().await;
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::debug!(pid, "Grace period elapsed, sending SIGKILL");
                self.child.kill().await
            }
        }
    }
}
