//! Colored CLI display utilities for bridge output.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal while a Codex turn streams through the bridge.

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::bridge::{BridgeMessage, CliResult, MessageKind};
use crate::probe::CliEnvironment;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Print thread start information.
pub fn print_session_start(channel: &str, thread_id: &str, raw_mode: bool) {
    println!(
        "{} {} channel={}, thread={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        channel.cyan(),
        truncate(thread_id, 36, raw_mode).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print a turn start marker.
pub fn print_turn_start() {
    println!("{} {}", timestamp().dimmed(), "[TURN]".blue().bold());
    let _ = io::stdout().flush();
}

/// Print assistant text.
pub fn print_text(text: &str) {
    println!("{text}");
    let _ = io::stdout().flush();
}

/// Print a turn end marker.
pub fn print_turn_end() {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[TURN]".blue().bold(),
        "done".dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}

/// Print the final result of an invocation.
pub fn print_result(result: &CliResult, raw_mode: bool) {
    let ts = timestamp();
    let thread = result
        .thread_id
        .as_deref()
        .map_or(String::new(), |id| format!("thread={}", truncate(id, 36, raw_mode)));

    if result.success {
        println!(
            "{} {} Completed ({} messages) {}",
            ts.dimmed(),
            "[RESULT]".green().bold(),
            result.message_count,
            thread.dimmed()
        );
    } else {
        println!(
            "{} {} {} {}",
            ts.dimmed(),
            "[RESULT]".red().bold(),
            truncate(result.error.as_deref().unwrap_or("Failed"), 200, raw_mode).red(),
            thread.dimmed()
        );
    }

    if let Some(usage) = result.usage {
        println!(
            "{} {} input={} cached={} output={}",
            ts.dimmed(),
            "[USAGE]".magenta().bold(),
            usage.input_tokens,
            usage.cached_input_tokens,
            usage.output_tokens
        );
    }
    let _ = io::stdout().flush();
}

/// Print one bridge notification.
pub fn print_bridge_message(channel: &str, message: &BridgeMessage, raw_mode: bool) {
    match message {
        BridgeMessage::Message { kind, payload } => match kind {
            MessageKind::SessionId => print_session_start(channel, payload, raw_mode),
            MessageKind::MessageStart => print_turn_start(),
            MessageKind::Content => print_text(payload),
            MessageKind::MessageEnd => print_turn_end(),
        },
        BridgeMessage::Error { message } => print_error(message),
        BridgeMessage::Complete { result } => print_result(result, raw_mode),
    }
}

/// Print the outcome of a `--version` probe.
pub fn print_environment(env: &CliEnvironment) {
    let ts = timestamp();
    if env.available {
        println!(
            "{} {} {} ({}) - {}",
            ts.dimmed(),
            "[CODEX]".magenta().bold(),
            env.path.as_deref().unwrap_or("codex").cyan(),
            env.version.as_deref().unwrap_or("unknown").dimmed(),
            "available".green()
        );
    } else {
        println!(
            "{} {} {} - {}",
            ts.dimmed(),
            "[CODEX]".magenta().bold(),
            "unavailable".red(),
            env.error.as_deref().unwrap_or("unknown error").dimmed()
        );
    }
    let _ = io::stdout().flush();
}

/// Print the outcome of executable detection.
pub fn print_detected(path: Option<&Path>) {
    match path {
        Some(path) => println!(
            "{} {}",
            "[DETECT]".green().bold(),
            path.display().to_string().cyan()
        ),
        None => println!(
            "{} {}",
            "[DETECT]".red().bold(),
            "no codex executable found".dimmed()
        ),
    }
    let _ = io::stdout().flush();
}
