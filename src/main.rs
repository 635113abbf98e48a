//! Codex Bridge - Stream Codex CLI turns to the terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use codex_bridge::bridge::{ChannelCallback, CodexBridge, MessageRequest};
use codex_bridge::config::{BridgeConfig, ConfigError, ConfigLoader};
use codex_bridge::display;

#[derive(Parser)]
#[command(
    name = "codex-bridge",
    about = "Drive the Codex CLI and stream its structured output",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one Codex turn and stream its output.
    Run {
        /// The task to execute.
        task: String,
        /// Channel identifier (random if omitted).
        #[arg(long)]
        channel: Option<String>,
        /// Thread to resume.
        #[arg(short, long)]
        session: Option<String>,
        /// Working directory for the CLI.
        #[arg(long)]
        cwd: Option<String>,
        /// Model to use.
        #[arg(short, long)]
        model: Option<String>,
        /// Permission mode (full-auto or a Codex sandbox mode).
        #[arg(short, long)]
        permission_mode: Option<String>,
        /// Do not truncate identifiers and errors.
        #[arg(long)]
        raw: bool,
    },
    /// Check that the Codex CLI answers `--version`.
    Check,
    /// Locate a Codex executable.
    Detect,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<BridgeConfig, ConfigError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load()
}

async fn run_turn(bridge: &CodexBridge, request: MessageRequest, raw: bool) -> ExitCode {
    let channel = request.channel_id.clone();
    let (callback, mut messages) = ChannelCallback::stream();
    let handle = bridge.send_message(request, Arc::new(callback));

    loop {
        tokio::select! {
            message = messages.next() => {
                let Some(message) = message else { break };
                display::print_bridge_message(&channel, &message, raw);
                if message.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(channel = %channel, "Ctrl-C received, interrupting");
                bridge.interrupt(&channel).await;
            }
        }
    }

    match handle.await {
        Ok(result) if result.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            display::print_error(&format!("Invocation task failed: {e}"));
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    let bridge = CodexBridge::from_config(&config);

    match cli.command {
        Commands::Run {
            task,
            channel,
            session,
            cwd,
            model,
            permission_mode,
            raw,
        } => {
            let channel = channel.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            bridge.launch_channel(&channel, session.as_deref());

            let mut request = MessageRequest::new(channel, task);
            request.session_id = session;
            request.cwd = cwd;
            request.model = model;
            request.permission_mode = permission_mode;

            let code = run_turn(&bridge, request, raw).await;
            bridge.cleanup_all().await;
            code
        }
        Commands::Check => {
            let env = bridge.check_environment().await;
            display::print_environment(&env);
            if env.available {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Detect => {
            let path = bridge.detect_executable();
            display::print_detected(path.as_deref());
            if path.is_some() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
