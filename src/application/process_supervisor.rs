//! Worker Process Supervisor
//!
//! Owns the limiter and monitor child processes: spawning on demand, the
//! startup handshake, line delivery to stdin, output pumping, and teardown.
//! There is no automatic restart; a crashed worker is respawned by the next
//! `ensure`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{broadcast, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::models::{
    Config, GatekeeperConfig, StartupSequence, StartupStep, WorkerId, WorkerSpec, WorkerState,
};
use crate::infrastructure::logging::SecretScrubber;

const EVENT_BUFFER: usize = 256;
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Supervisor error types
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{worker} executable not found at {}", path.display())]
    ExecutableNotFound { worker: WorkerId, path: PathBuf },

    #[error("failed to spawn {worker}: {source}")]
    SpawnFailed {
        worker: WorkerId,
        #[source]
        source: std::io::Error,
    },

    #[error("{worker} process not available: {reason}")]
    ProcessUnavailable { worker: WorkerId, reason: String },
}

impl SupervisorError {
    fn unavailable(worker: WorkerId, reason: impl Into<String>) -> Self {
        Self::ProcessUnavailable {
            worker,
            reason: reason.into(),
        }
    }
}

/// Output and lifecycle notifications from supervised workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Spawned { worker: WorkerId, pid: Option<u32> },
    Stdout { worker: WorkerId, line: String },
    Stderr { worker: WorkerId, line: String },
    /// The worker's stdout reached EOF.
    OutputClosed { worker: WorkerId },
    Stopped { worker: WorkerId },
}

struct WorkerSlot {
    spec: WorkerSpec,
    state: WorkerState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    pumps: Vec<JoinHandle<()>>,
    bound: Vec<AbortHandle>,
}

impl WorkerSlot {
    fn new(spec: WorkerSpec) -> Self {
        Self {
            spec,
            state: WorkerState::NotStarted,
            child: None,
            stdin: None,
            pumps: Vec::new(),
            bound: Vec::new(),
        }
    }

    fn id(&self) -> WorkerId {
        self.spec.id
    }

    /// Reconcile `state` with the OS: a vanished child means a crash.
    fn refresh(&mut self) -> WorkerState {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => {}
                Ok(Some(status)) => {
                    warn!(worker = %self.spec.id, ?status, "worker exited unexpectedly");
                    self.mark_crashed();
                }
                Err(e) => {
                    warn!(worker = %self.spec.id, error = %e, "failed to poll worker status");
                    self.mark_crashed();
                }
            }
        }
        self.state
    }

    fn is_live(&mut self) -> bool {
        self.refresh() == WorkerState::Running && self.child.is_some()
    }

    fn mark_crashed(&mut self) {
        self.child = None;
        self.stdin = None;
        self.state = WorkerState::Crashed;
    }

    /// Abort tasks bound to the previous process.
    fn release_watches(&mut self) {
        for handle in self.bound.drain(..) {
            handle.abort();
        }
    }

    fn abort_pumps(&mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
    }
}

/// Supervisor for the two worker processes.
///
/// One instance is created at startup and shared (`Arc`) with everything that
/// talks to workers. Each worker has its own lock so a slow monitor handshake
/// never blocks commands to the limiter.
pub struct ProcessSupervisor {
    gatekeeper: Mutex<WorkerSlot>,
    deepguard: Mutex<WorkerSlot>,
    events: broadcast::Sender<SupervisorEvent>,
    scrubber: SecretScrubber,
}

impl ProcessSupervisor {
    /// Create a supervisor. Nothing is spawned until `ensure`.
    pub fn new(gatekeeper: WorkerSpec, deepguard: WorkerSpec) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            gatekeeper: Mutex::new(WorkerSlot::new(gatekeeper)),
            deepguard: Mutex::new(WorkerSlot::new(deepguard)),
            events,
            scrubber: SecretScrubber::new(),
        }
    }

    /// Build worker specs from configuration.
    ///
    /// The monitor's handshake depends on run-time settings and is installed by
    /// the control plane before each start.
    pub fn from_config(config: &Config) -> Self {
        let gatekeeper = WorkerSpec::new(WorkerId::Gatekeeper, &config.gatekeeper.executable)
            .with_startup(gatekeeper_handshake(&config.gatekeeper));

        let mut deepguard = WorkerSpec::new(WorkerId::DeepGuard, &config.deepguard.executable);
        if !config.tail.cipher_key.is_empty() {
            deepguard = deepguard.with_env("MONITOR_KEY", &config.tail.cipher_key);
        }

        Self::new(gatekeeper, deepguard)
            .with_scrubber(SecretScrubber::new().with_secret(&config.tail.cipher_key))
    }

    #[must_use]
    pub fn with_scrubber(mut self, scrubber: SecretScrubber) -> Self {
        self.scrubber = scrubber;
        self
    }

    fn slot(&self, id: WorkerId) -> &Mutex<WorkerSlot> {
        match id {
            WorkerId::Gatekeeper => &self.gatekeeper,
            WorkerId::DeepGuard => &self.deepguard,
        }
    }

    /// Subscribe to worker output and lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    /// Spawn the worker unless it is already running.
    ///
    /// Returns `true` when a new process was started. Returns once the startup
    /// sequence has been written.
    #[instrument(skip(self), fields(worker = %id))]
    pub async fn ensure(&self, id: WorkerId) -> Result<bool, SupervisorError> {
        let mut slot = self.slot(id).lock().await;
        self.ensure_locked(&mut slot).await
    }

    /// Write one line to the worker's stdin.
    ///
    /// Success means the OS accepted the bytes; nothing confirms the worker
    /// read them.
    pub async fn send_command(&self, id: WorkerId, text: &str) -> Result<(), SupervisorError> {
        let mut slot = self.slot(id).lock().await;
        Self::send_locked(&mut slot, text).await
    }

    /// `ensure` followed by `send_command`, atomically with respect to `stop`.
    pub async fn deliver(&self, id: WorkerId, text: &str) -> Result<(), SupervisorError> {
        let mut slot = self.slot(id).lock().await;
        self.ensure_locked(&mut slot).await?;
        Self::send_locked(&mut slot, text).await
    }

    /// Kill the worker and release any watch bound to it.
    #[instrument(skip(self), fields(worker = %id))]
    pub async fn stop(&self, id: WorkerId) {
        let mut slot = self.slot(id).lock().await;

        slot.release_watches();
        slot.stdin = None;

        if let Some(mut child) = slot.child.take() {
            info!("Stopping worker");
            if let Err(e) = child.start_kill() {
                warn!(error = ?e, "Failed to send kill signal to worker");
            }

            match tokio::time::timeout(KILL_WAIT, child.wait()).await {
                Ok(Ok(status)) => info!(?status, "Worker exited"),
                Ok(Err(e)) => error!(error = ?e, "Error waiting for worker to exit"),
                Err(_) => warn!("Worker did not exit after kill"),
            }
        }

        slot.abort_pumps();
        slot.state = WorkerState::Stopped;
        let _ = self.events.send(SupervisorEvent::Stopped { worker: id });
    }

    /// Stop both workers.
    pub async fn shutdown(&self) {
        info!("Shutting down workers");
        for id in WorkerId::ALL {
            self.stop(id).await;
        }
    }

    /// Current state, reconciled with the OS.
    pub async fn state(&self, id: WorkerId) -> WorkerState {
        self.slot(id).lock().await.refresh()
    }

    /// OS process id of the live worker.
    pub async fn pid(&self, id: WorkerId) -> Option<u32> {
        let mut slot = self.slot(id).lock().await;
        if slot.is_live() {
            slot.child.as_ref().and_then(Child::id)
        } else {
            None
        }
    }

    /// Replace the sequence played on the next spawn.
    pub async fn set_startup_sequence(&self, id: WorkerId, startup: StartupSequence) {
        self.slot(id).lock().await.spec.startup = startup;
    }

    /// Tie a background task's lifetime to the worker: `stop` aborts it.
    pub async fn bind_watch(&self, id: WorkerId, handle: AbortHandle) {
        self.slot(id).lock().await.bound.push(handle);
    }

    async fn ensure_locked(&self, slot: &mut WorkerSlot) -> Result<bool, SupervisorError> {
        if slot.is_live() {
            return Ok(false);
        }

        let id = slot.id();
        let executable = slot.spec.executable.clone();
        if !executable.exists() {
            error!(path = %executable.display(), "Worker executable not found");
            return Err(SupervisorError::ExecutableNotFound {
                worker: id,
                path: executable,
            });
        }

        slot.abort_pumps();
        slot.release_watches();

        info!(path = %executable.display(), "Spawning worker");
        let mut command = Command::new(&executable);
        if let Some(dir) = slot.spec.working_dir() {
            command.current_dir(dir);
        }
        let mut child = command
            .envs(slot.spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::SpawnFailed { worker: id, source })?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            slot.pumps.push(tokio::spawn(pump_stdout(
                id,
                stdout,
                self.events.clone(),
                self.scrubber.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            slot.pumps.push(tokio::spawn(pump_stderr(
                id,
                stderr,
                self.events.clone(),
                self.scrubber.clone(),
            )));
        }

        slot.stdin = child.stdin.take();
        slot.child = Some(child);
        slot.state = WorkerState::Running;
        info!(?pid, "Worker started");
        let _ = self.events.send(SupervisorEvent::Spawned { worker: id, pid });

        let startup = slot.spec.startup.clone();
        play_startup(slot, &startup).await?;

        Ok(true)
    }

    async fn send_locked(slot: &mut WorkerSlot, text: &str) -> Result<(), SupervisorError> {
        let id = slot.id();
        if !slot.is_live() {
            return Err(SupervisorError::unavailable(id, format!("worker is {}", slot.state)));
        }
        let Some(stdin) = slot.stdin.as_mut() else {
            return Err(SupervisorError::unavailable(id, "stdin is closed"));
        };

        if let Err(e) = write_line(stdin, text).await {
            warn!(worker = %id, error = %e, "Write to worker stdin failed");
            slot.mark_crashed();
            return Err(SupervisorError::unavailable(id, e.to_string()));
        }
        debug!(worker = %id, command = %text, "Command written");
        Ok(())
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        // Ensure child processes are killed when the supervisor is dropped
        for slot in [self.gatekeeper.get_mut(), self.deepguard.get_mut()] {
            slot.release_watches();
            if let Some(mut child) = slot.child.take() {
                let _ = child.start_kill();
            }
        }
    }
}

/// Limiter handshake: request budget, then window length, back to back.
pub fn gatekeeper_handshake(config: &GatekeeperConfig) -> StartupSequence {
    StartupSequence::new(vec![
        StartupStep::immediate(config.max_requests.to_string()),
        StartupStep::immediate(config.window_secs.to_string()),
    ])
}

async fn play_startup(
    slot: &mut WorkerSlot,
    startup: &StartupSequence,
) -> Result<(), SupervisorError> {
    let id = slot.id();
    for step in startup.steps() {
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        let Some(stdin) = slot.stdin.as_mut() else {
            return Err(SupervisorError::unavailable(id, "stdin is closed"));
        };
        if let Err(e) = write_line(stdin, &step.payload).await {
            warn!(worker = %id, error = %e, "Worker went away during startup sequence");
            slot.mark_crashed();
            return Err(SupervisorError::unavailable(id, e.to_string()));
        }
    }
    if !startup.is_empty() {
        info!(worker = %id, steps = startup.steps().len(), "Configuration sequence complete");
    }
    Ok(())
}

async fn write_line(stdin: &mut ChildStdin, text: &str) -> std::io::Result<()> {
    let mut line = String::with_capacity(text.len() + 1);
    line.push_str(text);
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

async fn pump_stdout(
    worker: WorkerId,
    stdout: tokio::process::ChildStdout,
    events: broadcast::Sender<SupervisorEvent>,
    scrubber: SecretScrubber,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(worker = %worker, line = %scrubber.scrub_message(&line), "worker stdout");
                let _ = events.send(SupervisorEvent::Stdout { worker, line });
            }
            Ok(None) => break,
            Err(e) => {
                warn!(worker = %worker, error = %e, "Failed to read worker stdout");
                break;
            }
        }
    }
    let _ = events.send(SupervisorEvent::OutputClosed { worker });
}

async fn pump_stderr(
    worker: WorkerId,
    stderr: tokio::process::ChildStderr,
    events: broadcast::Sender<SupervisorEvent>,
    scrubber: SecretScrubber,
) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = scrubber.scrub_message(&line);
        warn!(worker = %worker, line = %line, "worker stderr");
        let _ = events.send(SupervisorEvent::Stderr { worker, line });
    }
}
