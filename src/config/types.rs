//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bridge configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Codex executable name or path.
    pub executable: String,
    /// API key injected into every child process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name the API key is injected as.
    pub api_key_env: String,
    /// Milliseconds between SIGTERM and SIGKILL on interrupt.
    pub interrupt_grace_ms: u64,
    /// Default model when a request names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Default permission mode when a request names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
}

fn default_executable() -> String {
    "codex".to_string()
}

fn default_api_key_env() -> String {
    "CODEX_API_KEY".to_string()
}

fn default_interrupt_grace_ms() -> u64 {
    1000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            api_key: None,
            api_key_env: default_api_key_env(),
            interrupt_grace_ms: default_interrupt_grace_ms(),
            model: None,
            permission_mode: None,
        }
    }
}

impl BridgeConfig {
    /// Interrupt grace period as a `Duration`.
    #[must_use]
    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_millis(self.interrupt_grace_ms)
    }
}
