//! Codex CLI discovery and version probing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Executable name searched on `PATH`.
const CODEX_BINARY: &str = "codex";

/// Upper bound on how long `--version` may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const NOT_FOUND: &str = "Codex CLI not found or not executable";

const VERSION_PATTERN: &str = r"\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.\-]+)?";

/// Result of probing the Codex CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliEnvironment {
    /// Whether the CLI answered `--version` successfully.
    pub available: bool,
    /// First line printed by `--version`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Executable that was probed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Why the CLI is unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CliEnvironment {
    fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Semantic version number extracted from the version line.
    #[must_use]
    pub fn version_number(&self) -> Option<String> {
        self.version.as_deref().and_then(parse_version)
    }
}

/// Run `<executable> --version` and report what it says.
pub async fn check_environment(executable: &str) -> CliEnvironment {
    let mut cmd = Command::new(executable);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::warn!(executable = %executable, error = %e, "Codex CLI probe failed");
            return CliEnvironment::unavailable(e.to_string());
        }
        Err(_) => {
            tracing::warn!(executable = %executable, "Codex CLI probe timed out");
            return CliEnvironment::unavailable(format!(
                "Timed out after {}s running {executable} --version",
                PROBE_TIMEOUT.as_secs()
            ));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.lines().next() {
        Some(line) if output.status.success() => {
            let version = line.trim().to_string();
            tracing::info!(executable = %executable, version = %version, "Codex CLI available");
            CliEnvironment {
                available: true,
                version: Some(version),
                path: Some(executable.to_string()),
                error: None,
            }
        }
        _ => {
            tracing::warn!(executable = %executable, status = %output.status, "Codex CLI not usable");
            CliEnvironment::unavailable(NOT_FOUND)
        }
    }
}

/// Locate a usable Codex executable.
///
/// A configured path other than the bare default wins when it is
/// executable; then `PATH`; then well-known install locations.
#[must_use]
pub fn detect_executable(configured: &str) -> Option<PathBuf> {
    if configured != CODEX_BINARY && is_executable(Path::new(configured)) {
        return Some(PathBuf::from(configured));
    }

    if let Ok(path) = which::which(CODEX_BINARY) {
        if is_executable(&path) {
            tracing::debug!(path = %path.display(), "Found codex on PATH");
            return Some(path);
        }
    }

    let found = common_locations().into_iter().find(|p| is_executable(p));
    if let Some(path) = &found {
        tracing::debug!(path = %path.display(), "Found codex in a common location");
    }
    found
}

/// Well-known install locations for the current platform.
#[must_use]
pub fn common_locations() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(unix)]
    {
        paths.push(PathBuf::from("/usr/local/bin/codex"));
        paths.push(PathBuf::from("/opt/homebrew/bin/codex"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".local").join("bin").join("codex"));
        }
    }

    #[cfg(windows)]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            paths.push(PathBuf::from(appdata).join("npm").join("codex.cmd"));
        }
        if let Some(program_files) = std::env::var_os("PROGRAMFILES") {
            paths.push(PathBuf::from(program_files).join("Codex").join("codex.exe"));
        }
    }

    paths
}

/// Returns true if `path` is a regular file the current user may execute.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Extract a `major.minor.patch` version from a `--version` line.
#[must_use]
pub fn parse_version(line: &str) -> Option<String> {
    let re = Regex::new(VERSION_PATTERN).ok()?;
    re.find(line).map(|m| m.as_str().to_string())
}
