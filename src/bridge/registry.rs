//! Live process registry and cancellation control.
//!
//! Each channel owns at most one live Codex process. The task that spawned
//! the process keeps the child and watches two tokens; everyone else talks
//! to it through a [`ProcessHandle`] stored here.

use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cli::CodexProcess;

/// Default time between SIGTERM and SIGKILL on interrupt.
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(1);

/// Extra time allowed for a killed process to be reaped.
const KILL_SETTLE: Duration = Duration::from_secs(2);

/// Error type for registry operations.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// The channel already has a live process.
    #[error("Channel already has a running process: {channel}")]
    ChannelBusy {
        /// Channel identifier.
        channel: String,
    },
}

/// Handle to a registered process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    generation: u64,
    terminate: CancellationToken,
    kill: CancellationToken,
    exited: watch::Receiver<bool>,
}

impl ProcessHandle {
    /// Process ID at launch.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns true once the process has been reaped.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Wait up to `limit` for the process to be reaped.
    ///
    /// Returns false if it is still running when the limit elapses.
    pub async fn wait_exited(&self, limit: Duration) -> bool {
        let mut exited = self.exited.clone();
        tokio::time::timeout(limit, exited.wait_for(|done| *done))
            .await
            .map(|_| ())
            .is_ok()
    }
}

/// Receiving side of a [`ProcessHandle`], held by the task owning the child.
#[derive(Debug)]
pub struct ProcessSignals {
    grace: Duration,
    terminate: CancellationToken,
    kill: CancellationToken,
    exited: watch::Sender<bool>,
}

impl ProcessSignals {
    /// Wait for the process, honouring terminate and kill requests.
    ///
    /// A terminate request sends SIGTERM and escalates to SIGKILL after the
    /// grace period. Marks the handle exited however the wait ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be waited on or signalled.
    pub async fn supervise(self, mut process: CodexProcess) -> std::io::Result<ExitStatus> {
        let status = tokio::select! {
            status = process.wait() => status,
            () = self.terminate.cancelled() => {
                match process.graceful_terminate(self.grace).await {
                    Ok(()) => process.wait().await,
                    Err(e) => Err(e),
                }
            }
            () = self.kill.cancelled() => {
                match process.kill().await {
                    Ok(()) => process.wait().await,
                    Err(e) => Err(e),
                }
            }
        };
        self.exited.send_replace(true);
        status
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    processes: HashMap<String, ProcessHandle>,
    interrupted: HashMap<String, u64>,
    next_generation: u64,
}

/// Registry of live processes and interruption flags, keyed by channel.
#[derive(Debug)]
pub struct ProcessRegistry {
    state: Mutex<RegistryState>,
    grace: Duration,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_INTERRUPT_GRACE)
    }
}

impl ProcessRegistry {
    /// Create an empty registry with the given interrupt grace period.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            grace,
        }
    }

    /// Interrupt grace period.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly spawned process under `channel`.
    ///
    /// The entry is visible to [`interrupt`](Self::interrupt) as soon as this
    /// returns, and is removed when the returned [`Registration`] drops.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::ChannelBusy` if the channel already has an
    /// entry.
    pub fn register(
        self: &Arc<Self>,
        channel: &str,
        pid: Option<u32>,
    ) -> Result<(Registration, ProcessSignals), RegistryError> {
        let mut state = self.lock();
        if state.processes.contains_key(channel) {
            return Err(RegistryError::ChannelBusy {
                channel: channel.to_string(),
            });
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let terminate = CancellationToken::new();
        let kill = CancellationToken::new();
        let (exited_tx, exited_rx) = watch::channel(false);

        state.processes.insert(
            channel.to_string(),
            ProcessHandle {
                pid,
                generation,
                terminate: terminate.clone(),
                kill: kill.clone(),
                exited: exited_rx,
            },
        );
        tracing::debug!(channel = %channel, ?pid, generation, "Registered process");

        let registration = Registration {
            registry: Arc::clone(self),
            channel: channel.to_string(),
            generation,
        };
        let signals = ProcessSignals {
            grace: self.grace,
            terminate,
            kill,
            exited: exited_tx,
        };
        Ok((registration, signals))
    }

    /// Interrupt the live process on `channel`, if any.
    ///
    /// Marks the channel interrupted, requests graceful termination and waits
    /// until the process is gone (SIGKILL follows after the grace period).
    /// Returns false when there was nothing to interrupt.
    pub async fn interrupt(&self, channel: &str) -> bool {
        let handle = {
            let mut state = self.lock();
            let Some(handle) = state.processes.get(channel).cloned() else {
                return false;
            };
            if handle.has_exited() {
                return false;
            }
            state
                .interrupted
                .insert(channel.to_string(), handle.generation);
            handle
        };

        tracing::info!(channel = %channel, pid = ?handle.pid, "Interrupting channel");
        handle.terminate.cancel();

        if !handle.wait_exited(self.grace + KILL_SETTLE).await {
            tracing::warn!(channel = %channel, "Process outlived grace period, forcing kill");
            handle.kill.cancel();
            handle.wait_exited(KILL_SETTLE).await;
        }
        true
    }

    /// Returns true if the registration for `channel` with `generation` was
    /// interrupted.
    fn is_interrupted(&self, channel: &str, generation: u64) -> bool {
        self.lock().interrupted.get(channel) == Some(&generation)
    }

    /// Force-kill every registered process and clear the registry.
    pub async fn cleanup_all(&self) {
        let handles: Vec<ProcessHandle> = {
            let mut state = self.lock();
            state.interrupted.clear();
            state.processes.drain().map(|(_, handle)| handle).collect()
        };

        tracing::info!(count = handles.len(), "Cleaning up all Codex CLI processes");
        for handle in &handles {
            handle.kill.cancel();
        }
        for handle in handles {
            if !handle.wait_exited(KILL_SETTLE).await {
                tracing::warn!(pid = ?handle.pid, "Process still running after cleanup");
            }
        }
    }

    /// Number of registered processes.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().processes.len()
    }

    /// Returns true if `channel` has a registered process.
    #[must_use]
    pub fn is_active(&self, channel: &str) -> bool {
        self.lock().processes.contains_key(channel)
    }

    fn finalize(&self, channel: &str, generation: u64) {
        let mut state = self.lock();
        if state
            .processes
            .get(channel)
            .is_some_and(|h| h.generation == generation)
        {
            state.processes.remove(channel);
        }
        if state.interrupted.get(channel) == Some(&generation) {
            state.interrupted.remove(channel);
        }
        tracing::debug!(channel = %channel, generation, "Released process");
    }
}

/// Ownership of a registry entry.
///
/// Dropping it removes the process handle and interruption flag, on every
/// exit path of the invocation.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<ProcessRegistry>,
    channel: String,
    generation: u64,
}

impl Registration {
    /// Channel this registration belongs to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns true if an interrupt was requested for this registration.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.registry.is_interrupted(&self.channel, self.generation)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.finalize(&self.channel, self.generation);
    }
}
