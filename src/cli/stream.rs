//! Stream parsing for Codex CLI stdout and stderr.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

use crate::cli::CodexEvent;

/// Error type for stream operations.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// A line could not be decoded as a protocol event.
    #[error("Failed to parse event: {reason}")]
    ParseError {
        /// The offending line.
        input: String,
        /// Decoder message.
        reason: String,
    },
    /// Reading the stream failed.
    #[error("Stream read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One line read from the structured stream.
#[derive(Debug)]
pub struct StreamLine {
    /// The line as read, without its terminator.
    pub raw: String,
    /// Decoded event; `None` for blank lines.
    pub event: Option<Result<CodexEvent, StreamError>>,
}

/// Parser for Codex CLI JSON-lines output.
pub struct StreamParser;

impl StreamParser {
    /// Parse a single line of `--json` output.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::ParseError` if the line is not a JSON object
    /// with a string `type` field, or a known event lacks a required field.
    pub fn parse_line(line: &str) -> Result<CodexEvent, StreamError> {
        serde_json::from_str(line.trim()).map_err(|e| StreamError::ParseError {
            input: line.to_string(),
            reason: e.to_string(),
        })
    }

    /// Classify a raw line, skipping decoding for blank lines.
    #[must_use]
    pub fn classify(raw: String) -> StreamLine {
        let event = if raw.trim().is_empty() {
            None
        } else {
            Some(Self::parse_line(&raw))
        };
        StreamLine { raw, event }
    }
}

/// Read one `\n`-terminated line, decoding invalid UTF-8 lossily.
///
/// The terminator (and a preceding `\r`) is stripped. Returns `None` at EOF.
async fn next_line_lossy<R>(reader: &mut BufReader<R>) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Read structured-stream lines as they arrive.
///
/// Bytes that are not valid UTF-8 are replaced, so an undecodable line
/// surfaces as a parse error and reading continues. The stream ends at EOF,
/// or after yielding a read error.
pub fn read_lines<R>(reader: R) -> impl futures_core::Stream<Item = Result<StreamLine, StreamError>>
where
    R: AsyncRead + Unpin,
{
    futures_util::stream::unfold(Some(BufReader::new(reader)), |state| async move {
        let mut reader = state?;
        match next_line_lossy(&mut reader).await {
            Ok(Some(line)) => Some((Ok(StreamParser::classify(line)), Some(reader))),
            Ok(None) => None,
            Err(e) => Some((Err(StreamError::Io(e)), None)),
        }
    })
}

/// Drain the diagnostic stream on its own task, logging each line.
///
/// Keeps the child from stalling on a full stderr pipe while the caller
/// blocks on stdout. Undecodable bytes never stop the drain; only EOF or an
/// unrecoverable read error does.
pub fn drain_stderr<R>(reader: R, channel: &str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let channel = channel.to_string();
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        loop {
            match next_line_lossy(&mut reader).await {
                Ok(Some(line)) => tracing::info!(channel = %channel, stderr = %line, "Codex stderr"),
                Ok(None) => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "Error reading stderr");
                    break;
                }
            }
        }
    })
}
