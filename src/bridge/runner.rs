//! Bridge runner: one Codex CLI process per turn, streamed into callbacks.
//!
//! This module connects the command builder, process spawner, stream
//! reader, reducer and registry. Each [`CodexBridge::send_message`] call
//! runs on its own task; nothing escapes it except the final
//! [`CliResult`].

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::bridge::{
    CliResult, EventReducer, LastSession, MessageCallback, ProcessRegistry, RegistryError,
    DEFAULT_INTERRUPT_GRACE,
};
use crate::cli::{
    drain_stderr, read_lines, CodexCommand, CodexProcess, LaunchOptions, SpawnError,
};
use crate::config::BridgeConfig;
use crate::probe::{self, CliEnvironment};

/// Executable name used when none is configured.
pub const DEFAULT_EXECUTABLE: &str = "codex";

/// Environment variable carrying the credential into the child.
pub const DEFAULT_API_KEY_ENV: &str = "CODEX_API_KEY";

/// Error type for invocation setup.
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    /// The process could not be spawned.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// The channel already has a live process.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Process stdout was not available.
    #[error("Process stdout not available")]
    NoStdout,
    /// Process stderr was not available.
    #[error("Process stderr not available")]
    NoStderr,
}

/// A file attached to a message. Passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name shown to the user.
    pub file_name: String,
    /// MIME type, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Encoded file content.
    #[serde(default)]
    pub data: String,
}

/// Inputs of one invocation.
#[derive(Debug, Clone, Default)]
pub struct MessageRequest {
    /// Channel the invocation belongs to.
    pub channel_id: String,
    /// Task text.
    pub message: String,
    /// Thread to resume.
    pub session_id: Option<String>,
    /// Working directory.
    pub cwd: Option<String>,
    /// Attached files.
    pub attachments: Vec<Attachment>,
    /// Permission mode (`full-auto` or a tool-defined mode).
    pub permission_mode: Option<String>,
    /// Model name.
    pub model: Option<String>,
}

impl MessageRequest {
    /// Create a request for `message` on `channel_id`.
    #[must_use]
    pub fn new(channel_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Resume the given thread.
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Run in the given directory.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Attach files.
    #[must_use]
    pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Set the permission mode.
    #[must_use]
    pub fn permission_mode(mut self, mode: impl Into<String>) -> Self {
        self.permission_mode = Some(mode.into());
        self
    }

    /// Set the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Reply to [`CodexBridge::launch_channel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    /// Always true; launching a channel only prepares bookkeeping.
    pub success: bool,
    /// Channel identifier.
    pub channel_id: String,
    /// Thread the channel starts from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Status text.
    pub message: String,
}

#[derive(Debug, Clone)]
struct Settings {
    executable: String,
    api_key: Option<String>,
    api_key_env: String,
    model: Option<String>,
    permission_mode: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            model: None,
            permission_mode: None,
        }
    }
}

/// Bridge between a host and the Codex CLI.
///
/// Cheap to clone; clones share settings, the process registry and the
/// last-known thread.
#[derive(Debug, Clone)]
pub struct CodexBridge {
    settings: Arc<RwLock<Settings>>,
    last_session: Arc<LastSession>,
    registry: Arc<ProcessRegistry>,
}

impl Default for CodexBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CodexBridge {
    /// Create a bridge with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_interrupt_grace(DEFAULT_INTERRUPT_GRACE)
    }

    /// Create a bridge with a custom SIGTERM-to-SIGKILL grace period.
    #[must_use]
    pub fn with_interrupt_grace(grace: Duration) -> Self {
        Self {
            settings: Arc::new(RwLock::new(Settings::default())),
            last_session: Arc::new(LastSession::new()),
            registry: Arc::new(ProcessRegistry::new(grace)),
        }
    }

    /// Create a bridge from loaded configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        let bridge = Self::with_interrupt_grace(config.interrupt_grace());
        {
            let mut settings = bridge.settings_mut();
            settings.executable.clone_from(&config.executable);
            settings.api_key.clone_from(&config.api_key);
            settings.api_key_env.clone_from(&config.api_key_env);
            settings.model.clone_from(&config.model);
            settings.permission_mode.clone_from(&config.permission_mode);
        }
        bridge
    }

    fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn settings_mut(&self) -> std::sync::RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the Codex executable path.
    pub fn set_executable(&self, path: impl Into<String>) {
        let path = path.into();
        tracing::info!(path = %path, "Codex executable set");
        self.settings_mut().executable = path;
    }

    /// Get the Codex executable path.
    #[must_use]
    pub fn executable(&self) -> String {
        self.settings().executable
    }

    /// Set or clear the API key injected into child processes.
    pub fn set_api_key(&self, api_key: Option<String>) {
        tracing::info!(configured = api_key.is_some(), "API key updated");
        self.settings_mut().api_key = api_key;
    }

    /// Get the configured API key.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        self.settings().api_key
    }

    /// Thread ID of the most recently started thread, on any channel.
    #[must_use]
    pub fn last_session(&self) -> Option<String> {
        self.last_session.get()
    }

    /// Number of live invocations.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry.active_count()
    }

    /// Prepare a channel, optionally seeding the last-known thread.
    pub fn launch_channel(&self, channel_id: &str, session_id: Option<&str>) -> ChannelInfo {
        let session_id = crate::cli::usable(session_id).map(ToString::to_string);
        if let Some(id) = &session_id {
            self.last_session.set(id.clone());
        }
        tracing::info!(channel = %channel_id, ?session_id, "Codex CLI channel ready");
        ChannelInfo {
            success: true,
            channel_id: channel_id.to_string(),
            session_id,
            message: "Codex CLI channel ready".to_string(),
        }
    }

    /// Build the argument vector for a request against the current state.
    #[must_use]
    pub fn build_command(&self, request: &MessageRequest) -> CodexCommand {
        let settings = self.settings();
        CodexCommand::new(request.message.clone())
            .permission_mode(
                request
                    .permission_mode
                    .as_deref()
                    .or(settings.permission_mode.as_deref()),
            )
            .model(request.model.as_deref().or(settings.model.as_deref()))
            .resume(request.session_id.as_deref())
            .resume_last(self.last_session.is_set())
    }

    /// Start an invocation on its own task.
    ///
    /// The task resolves to the same result passed to `on_complete`.
    pub fn send_message(
        &self,
        request: MessageRequest,
        callback: Arc<dyn MessageCallback>,
    ) -> JoinHandle<CliResult> {
        let bridge = self.clone();
        tokio::spawn(async move { bridge.run(&request, callback.as_ref()).await })
    }

    /// Run an invocation to completion on the current task.
    ///
    /// Never fails: setup errors become a failed result, reported through
    /// `on_error` followed by `on_complete`.
    pub async fn run(&self, request: &MessageRequest, callback: &dyn MessageCallback) -> CliResult {
        match self.execute(request, callback).await {
            Ok(result) => {
                callback.on_complete(&result);
                result
            }
            Err(e) => {
                tracing::error!(channel = %request.channel_id, error = %e, "Codex CLI execution failed");
                let result = CliResult::failed(e.to_string());
                callback.on_error(&e.to_string());
                callback.on_complete(&result);
                result
            }
        }
    }

    async fn execute(
        &self,
        request: &MessageRequest,
        callback: &dyn MessageCallback,
    ) -> Result<CliResult, BridgeError> {
        let channel = request.channel_id.as_str();
        if self.registry.is_active(channel) {
            return Err(RegistryError::ChannelBusy {
                channel: channel.to_string(),
            }
            .into());
        }

        let settings = self.settings();
        let command = self.build_command(request);
        tracing::info!(
            channel = %channel,
            executable = %settings.executable,
            args = ?command.build_args(),
            attachments = request.attachments.len(),
            "Executing Codex CLI"
        );

        let mut options = LaunchOptions::default().working_dir(request.cwd.as_deref());
        if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            tracing::debug!(env = %settings.api_key_env, "API key configured");
            options = options.env(settings.api_key_env.clone(), key);
        }

        let mut process = CodexProcess::spawn(&settings.executable, &command, &options)?;
        let stdout = process.take_stdout().ok_or(BridgeError::NoStdout)?;
        let stderr = process.take_stderr().ok_or(BridgeError::NoStderr)?;
        let (registration, signals) = self.registry.register(channel, process.id())?;

        let stderr_task = drain_stderr(stderr, channel);
        let exit_task = tokio::spawn(signals.supervise(process));

        let mut reducer = EventReducer::new();
        let mut lines = std::pin::pin!(read_lines(stdout));
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "Stopped reading stdout");
                    break;
                }
            };
            reducer.record_raw(&line.raw);

            match line.event {
                None => {}
                Some(Err(e)) => {
                    tracing::warn!(channel = %channel, line = %line.raw, error = %e, "Skipping malformed line");
                }
                Some(Ok(event)) => {
                    if let Some(thread_id) = event.thread_id() {
                        self.last_session.set(thread_id);
                    }
                    if let Some(notification) = reducer.apply(&event) {
                        notification.deliver(callback);
                    }
                }
            }
        }

        let exit_code = match exit_task.await {
            Ok(Ok(status)) => exit_code(status),
            Ok(Err(e)) => {
                tracing::warn!(channel = %channel, error = %e, "Failed to wait for Codex CLI");
                -1
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Exit watcher task failed");
                -1
            }
        };
        if let Err(e) = stderr_task.await {
            tracing::debug!(channel = %channel, error = %e, "Stderr task failed");
        }

        let interrupted = registration.is_interrupted();
        drop(registration);

        if interrupted {
            tracing::info!(channel = %channel, "Process interrupted by user");
        } else {
            tracing::info!(channel = %channel, exit_code, "Codex CLI exited");
        }
        Ok(reducer.finish(exit_code, interrupted))
    }

    /// Interrupt the live invocation on `channel_id`.
    ///
    /// No-op when the channel has no live process.
    pub async fn interrupt(&self, channel_id: &str) -> bool {
        self.registry.interrupt(channel_id).await
    }

    /// Force-kill every live invocation.
    pub async fn cleanup_all(&self) {
        self.registry.cleanup_all().await;
    }

    /// Run the configured executable with `--version`.
    pub async fn check_environment(&self) -> CliEnvironment {
        probe::check_environment(&self.executable()).await
    }

    /// Locate a usable Codex executable.
    #[must_use]
    pub fn detect_executable(&self) -> Option<PathBuf> {
        probe::detect_executable(&self.executable())
    }
}

/// Exit code of a finished process; signals map to `128 + signo`.
fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status
            .code()
            .or_else(|| status.signal().map(|signal| 128 + signal))
            .unwrap_or(-1)
    }

    #[cfg(not(unix))]
    {
        status.code().unwrap_or(-1)
    }
}
