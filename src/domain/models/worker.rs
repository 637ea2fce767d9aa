use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identity of a supervised worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerId {
    /// Request-rate limiter.
    Gatekeeper,
    /// Resource-health monitor writing the encrypted alert log.
    DeepGuard,
}

impl WorkerId {
    /// Both workers, in teardown order.
    pub const ALL: [Self; 2] = [Self::Gatekeeper, Self::DeepGuard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gatekeeper => "gatekeeper",
            Self::DeepGuard => "deepguard",
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    NotStarted,
    Running,
    /// The process exited without an explicit stop. Healed by the next `ensure`.
    Crashed,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Crashed => write!(f, "crashed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// One line written to a worker's stdin after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupStep {
    pub payload: String,
    pub delay: Duration,
}

impl StartupStep {
    pub fn new(payload: impl Into<String>, delay: Duration) -> Self {
        Self {
            payload: payload.into(),
            delay,
        }
    }

    pub fn immediate(payload: impl Into<String>) -> Self {
        Self::new(payload, Duration::ZERO)
    }
}

/// Sequenced configuration protocol played into a freshly spawned worker.
///
/// Workers read their configuration as a series of prompts on stdin. There is
/// no readiness signal: each step waits its fixed delay and writes blindly, so a
/// worker that starts slower than expected can read the answers out of order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupSequence {
    steps: Vec<StartupStep>,
}

impl StartupSequence {
    pub fn new(steps: Vec<StartupStep>) -> Self {
        Self { steps }
    }

    /// Every payload separated by the same delay, the first one included.
    pub fn evenly_spaced<I, S>(payloads: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            payloads
                .into_iter()
                .map(|p| StartupStep::new(p, delay))
                .collect(),
        )
    }

    pub fn steps(&self) -> &[StartupStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all step delays.
    pub fn total_delay(&self) -> Duration {
        self.steps.iter().map(|s| s.delay).sum()
    }
}

/// Static description of how to launch a worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub id: WorkerId,
    /// Resolved executable path.
    pub executable: PathBuf,
    pub startup: StartupSequence,
    pub env: Vec<(String, String)>,
}

impl WorkerSpec {
    pub fn new(id: WorkerId, executable: impl Into<PathBuf>) -> Self {
        Self {
            id,
            executable: resolve_executable(executable.into()),
            startup: StartupSequence::default(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_startup(mut self, startup: StartupSequence) -> Self {
        self.startup = startup;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Directory the worker runs in.
    pub fn working_dir(&self) -> Option<&Path> {
        self.executable
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

/// Resolve a configured executable path once.
///
/// Relative paths are anchored at the current directory so they stay valid
/// after the child changes into its working directory. On Windows a bare path
/// gains an `.exe` suffix when that file exists.
pub fn resolve_executable(path: PathBuf) -> PathBuf {
    let path = std::path::absolute(&path).unwrap_or(path);
    if cfg!(windows) {
        let has_exe = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
        if !has_exe {
            let mut with_exe = path.clone().into_os_string();
            with_exe.push(".exe");
            let with_exe = PathBuf::from(with_exe);
            if with_exe.exists() {
                return with_exe;
            }
        }
    }
    path
}
