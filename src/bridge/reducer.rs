//! Protocol state reducer.
//!
//! Folds decoded [`CodexEvent`]s into a [`CliResult`] and yields the
//! notifications the host should see, one event at a time.

use serde::{Deserialize, Serialize};

use crate::bridge::{MessageCallback, MessageKind};
use crate::cli::{CodexEvent, Usage};

/// Error reported when the user interrupted the invocation.
pub const USER_INTERRUPTED: &str = "User interrupted";

/// Outcome of one invocation, delivered once through `on_complete`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliResult {
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Failure message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of completed assistant messages.
    pub message_count: usize,
    /// Every structured-stream line, newline terminated.
    pub raw_output: String,
    /// Concatenated assistant text.
    pub final_result: String,
    /// Thread identifier reported by the CLI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Token usage of the last completed turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CliResult {
    /// A failed result carrying only an error message.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Returns true if the failure was a user interruption.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.error.as_deref() == Some(USER_INTERRUPTED)
    }
}

/// A notification produced by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Forwarded as `on_message`.
    Message(MessageKind, String),
    /// Forwarded as `on_error`.
    Error(String),
}

impl Notification {
    /// Deliver the notification to a callback.
    pub fn deliver(&self, callback: &dyn MessageCallback) {
        match self {
            Self::Message(kind, payload) => callback.on_message(*kind, payload),
            Self::Error(message) => callback.on_error(message),
        }
    }
}

/// Single-pass reducer over the events of one invocation.
#[derive(Debug, Default)]
pub struct EventReducer {
    result: CliResult,
}

impl EventReducer {
    /// Create an empty reducer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw structured-stream line to the captured output.
    pub fn record_raw(&mut self, line: &str) {
        self.result.raw_output.push_str(line);
        self.result.raw_output.push('\n');
    }

    /// Apply one event and return the notification it produces, if any.
    pub fn apply(&mut self, event: &CodexEvent) -> Option<Notification> {
        match event {
            CodexEvent::ThreadStarted { thread_id } => {
                tracing::info!(thread_id = %thread_id, "Thread started");
                self.result.thread_id = Some(thread_id.clone());
                Some(Notification::Message(
                    MessageKind::SessionId,
                    thread_id.clone(),
                ))
            }
            CodexEvent::TurnStarted {} => {
                Some(Notification::Message(MessageKind::MessageStart, String::new()))
            }
            CodexEvent::ItemStarted { item } => {
                tracing::info!(item_type = %item.item_type, "Item started");
                None
            }
            CodexEvent::ItemCompleted { item } if item.is_agent_message() => {
                let Some(text) = item.text.clone() else {
                    tracing::warn!(item_id = ?item.id, "Agent message without text, skipping");
                    return None;
                };
                tracing::info!(len = text.len(), "Agent message received");
                self.result.final_result.push_str(&text);
                self.result.message_count += 1;
                Some(Notification::Message(MessageKind::Content, text))
            }
            CodexEvent::ItemCompleted { item } => {
                tracing::debug!(item_type = %item.item_type, "Ignoring completed item");
                None
            }
            CodexEvent::TurnCompleted { usage } => {
                if let Some(usage) = usage {
                    tracing::info!(
                        input_tokens = usage.input_tokens,
                        cached_input_tokens = usage.cached_input_tokens,
                        output_tokens = usage.output_tokens,
                        "Token usage"
                    );
                    self.result.usage = Some(*usage);
                }
                Some(Notification::Message(MessageKind::MessageEnd, String::new()))
            }
            CodexEvent::TurnFailed { .. } | CodexEvent::Error { .. } => {
                let message = event.failure_message().unwrap_or_default();
                tracing::error!(error = %message, "Codex CLI error");
                self.result.error = Some(message.clone());
                Some(Notification::Error(message))
            }
            CodexEvent::Unknown => None,
        }
    }

    /// Current thread identifier, if one was reported.
    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.result.thread_id.as_deref()
    }

    /// Accumulated assistant text so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.result.final_result
    }

    /// Finish the invocation and compute the final result.
    ///
    /// An interruption always wins. Otherwise success is exactly a zero exit
    /// code; a non-zero exit without a captured error names the code.
    #[must_use]
    pub fn finish(self, exit_code: i32, interrupted: bool) -> CliResult {
        let mut result = self.result;
        if interrupted {
            result.success = false;
            result.error = Some(USER_INTERRUPTED.to_string());
        } else {
            result.success = exit_code == 0;
            if !result.success && result.error.is_none() {
                result.error = Some(format!("Codex CLI exited with code: {exit_code}"));
            }
        }
        result
    }
}
