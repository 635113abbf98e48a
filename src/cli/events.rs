//! Event types from Codex CLI `exec --json` output.
//!
//! Each line the CLI writes to stdout is one JSON object tagged by a
//! dotted `type` field (`thread.started`, `item.completed`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Item type of a completed assistant reply.
pub const AGENT_MESSAGE: &str = "agent_message";

/// Message reported when a failure event carries no message of its own.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// A unit of agent output reported by `item.started` / `item.completed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadItem {
    /// Item identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type (e.g., `agent_message`, `command_execution`, `file_change`).
    #[serde(rename = "type")]
    pub item_type: String,
    /// Text payload for message-like items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Command line for `command_execution` items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Item status (e.g., `in_progress`, `completed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ThreadItem {
    /// Returns true if this item is an assistant reply.
    #[must_use]
    pub fn is_agent_message(&self) -> bool {
        self.item_type == AGENT_MESSAGE
    }
}

/// Token usage reported on `turn.completed`.
///
/// Missing counters default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Prompt tokens served from cache.
    pub cached_input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
}

/// Text carried by a loosely shaped failure payload.
///
/// Strings are taken as is, numbers and booleans are rendered, and objects
/// are searched for a nested `message`.
fn payload_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        Value::Object(map) => map.get("message").and_then(payload_text),
        Value::Null | Value::Array(_) => None,
    }
}

/// Events emitted by the Codex CLI in `--json` mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CodexEvent {
    /// A new conversation thread was created or resumed.
    #[serde(rename = "thread.started")]
    ThreadStarted {
        /// Opaque thread identifier, used to resume later.
        thread_id: String,
    },
    /// A turn began.
    #[serde(rename = "turn.started")]
    TurnStarted {},
    /// An item began.
    #[serde(rename = "item.started")]
    ItemStarted {
        /// The item being produced.
        item: ThreadItem,
    },
    /// An item finished.
    #[serde(rename = "item.completed")]
    ItemCompleted {
        /// The finished item.
        item: ThreadItem,
    },
    /// A turn finished.
    #[serde(rename = "turn.completed")]
    TurnCompleted {
        /// Token usage for the turn.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    /// A turn failed.
    #[serde(rename = "turn.failed")]
    TurnFailed {
        /// Top-level failure message, in whatever shape the CLI sent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<Value>,
        /// Failure object or string.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
    /// A stream-level error.
    #[serde(rename = "error")]
    Error {
        /// Failure message, in whatever shape the CLI sent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<Value>,
        /// Failure object or string.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
    /// Catch-all for unknown event types.
    #[serde(other)]
    Unknown,
}

impl CodexEvent {
    /// Returns the thread ID if this is a `thread.started` event.
    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        match self {
            Self::ThreadStarted { thread_id } => Some(thread_id),
            _ => None,
        }
    }

    /// Returns true for `turn.failed` and `error` events.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TurnFailed { .. } | Self::Error { .. })
    }

    /// Failure message for `turn.failed` / `error` events.
    ///
    /// Prefers a top-level `message`, then `error` (a string or an object
    /// with a `message`), then [`UNKNOWN_ERROR`]. Returns `None` for every
    /// other event.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::TurnFailed { message, error } | Self::Error { message, error } => Some(
                message
                    .as_ref()
                    .and_then(payload_text)
                    .or_else(|| error.as_ref().and_then(payload_text))
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            ),
            _ => None,
        }
    }
}
