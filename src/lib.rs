//! Codex Bridge - Run the Codex CLI and stream its structured output.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod display;
pub mod probe;
