//! Callback protocol pushed to the host.
//!
//! Per invocation the host sees zero or more `on_message` calls, at most
//! one `on_error`, and exactly one `on_complete`, always last.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::bridge::CliResult;

/// Kind tag of an `on_message` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Thread identifier assigned by the CLI.
    SessionId,
    /// A turn began.
    MessageStart,
    /// Assistant text.
    Content,
    /// A turn finished.
    MessageEnd,
}

impl MessageKind {
    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionId => "session_id",
            Self::MessageStart => "message_start",
            Self::Content => "content",
            Self::MessageEnd => "message_end",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of invocation notifications.
///
/// Called synchronously from the invocation task, in event order.
pub trait MessageCallback: Send + Sync {
    /// A protocol message.
    fn on_message(&self, kind: MessageKind, payload: &str);
    /// A turn failure or launch failure.
    fn on_error(&self, message: &str);
    /// The final result. Always the last call.
    fn on_complete(&self, result: &CliResult);
}

/// A notification carried over a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// See [`MessageCallback::on_message`].
    Message {
        /// Message kind.
        kind: MessageKind,
        /// Message payload; empty for start/end markers.
        payload: String,
    },
    /// See [`MessageCallback::on_error`].
    Error {
        /// Failure message.
        message: String,
    },
    /// See [`MessageCallback::on_complete`].
    Complete {
        /// Final result.
        result: CliResult,
    },
}

impl BridgeMessage {
    /// Returns true for the final `Complete` message.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Callback that forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

impl ChannelCallback {
    /// Create a callback and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a callback whose notifications are consumed as a `Stream`.
    #[must_use]
    pub fn stream() -> (Self, UnboundedReceiverStream<BridgeMessage>) {
        let (callback, rx) = Self::channel();
        (callback, UnboundedReceiverStream::new(rx))
    }

    fn send(&self, message: BridgeMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Callback receiver dropped");
        }
    }
}

impl MessageCallback for ChannelCallback {
    fn on_message(&self, kind: MessageKind, payload: &str) {
        self.send(BridgeMessage::Message {
            kind,
            payload: payload.to_string(),
        });
    }

    fn on_error(&self, message: &str) {
        self.send(BridgeMessage::Error {
            message: message.to_string(),
        });
    }

    fn on_complete(&self, result: &CliResult) {
        self.send(BridgeMessage::Complete {
            result: result.clone(),
        });
    }
}
