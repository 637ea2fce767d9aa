//! Control plane: the single surface the operator front end talks to.
//!
//! Wires the validator, supervisor, log tail, classifier, feedback loop and
//! audit store together. Long-lived driver tasks consume the tail's classified
//! lines and the limiter's stdout for the lifetime of the control plane.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use crate::application::feedback_controller::FeedbackController;
use crate::application::process_supervisor::{ProcessSupervisor, SupervisorError, SupervisorEvent};
use crate::application::secure_log_tail::{SecureLogTail, TailError, TailEvent};
use crate::domain::errors::DomainError;
use crate::domain::models::{
    AlertNotification, AlertRecord, ClassifiedLine, Config, DeepGuardConfig, GatekeeperLogRecord,
    StartupSequence, WorkerId, WorkerState,
};
use crate::domain::ports::AuditStore;
use crate::infrastructure::crypto::{build_cipher, CipherError};
use crate::services::alert_classifier::{AlertClassifier, KeywordClassifier};
use crate::services::command_validator::{self, Rejection};
use crate::services::gatekeeper_output::{is_decision_line, parse_decision};

const NOTIFICATION_BUFFER: usize = 64;

/// Control plane error types
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Invalid command format or unauthorized command: {0}")]
    ValidationRejected(Rejection),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("Monitor cipher key is not set (configure tail.cipher_key or MONITOR_KEY)")]
    MissingCipherKey,

    #[error("Cipher setup failed: {0}")]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Tail(#[from] TailError),

    #[error("Audit store error: {0}")]
    Audit(#[from] DomainError),
}

/// Acknowledgement returned to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    CommandSent,
    Started,
    AlreadyRunning,
    Stopped,
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CommandSent => "Command sent",
            Self::Started => "Started",
            Self::AlreadyRunning => "Already running",
            Self::Stopped => "Stopped",
        };
        f.write_str(text)
    }
}

/// Run-time settings answered to the monitor's startup prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub cpu_threshold: String,
    pub ram_threshold: Option<String>,
    pub interval_secs: u64,
    pub log_path: PathBuf,
    /// Gap before each handshake line.
    pub prompt_delay: Duration,
}

impl From<&DeepGuardConfig> for MonitorSettings {
    fn from(config: &DeepGuardConfig) -> Self {
        Self {
            cpu_threshold: config.cpu_threshold.clone(),
            ram_threshold: config.ram_threshold.clone(),
            interval_secs: config.interval_secs,
            log_path: PathBuf::from(&config.log_path),
            prompt_delay: Duration::from_millis(config.prompt_delay_ms),
        }
    }
}

/// Monitor handshake: CPU threshold, RAM threshold, log path, interval.
///
/// A missing RAM threshold is answered with an empty line so the later
/// answers keep their positions.
pub fn monitor_handshake(settings: &MonitorSettings, log_path: &Path) -> StartupSequence {
    StartupSequence::evenly_spaced(
        [
            settings.cpu_threshold.clone(),
            settings.ram_threshold.clone().unwrap_or_default(),
            log_path.display().to_string(),
            settings.interval_secs.to_string(),
        ],
        settings.prompt_delay,
    )
}

pub struct ControlPlane {
    config: Config,
    supervisor: Arc<ProcessSupervisor>,
    tail: Arc<SecureLogTail>,
    audit: Arc<dyn AuditStore>,
    notifications: broadcast::Sender<AlertNotification>,
    monitor_lock: Mutex<()>,
    drivers: Vec<AbortHandle>,
}

impl ControlPlane {
    /// Build the control plane with the keyword classifier.
    ///
    /// Must be called inside a tokio runtime: the alert and limiter-output
    /// drivers are spawned here. No worker is started.
    pub fn new(config: Config, audit: Arc<dyn AuditStore>) -> Self {
        Self::with_classifier(config, audit, Arc::new(KeywordClassifier::new()))
    }

    pub fn with_classifier(
        config: Config,
        audit: Arc<dyn AuditStore>,
        classifier: Arc<dyn AlertClassifier>,
    ) -> Self {
        let supervisor = Arc::new(ProcessSupervisor::from_config(&config));
        let tail = Arc::new(SecureLogTail::new(
            Duration::from_millis(config.tail.poll_interval_ms),
            classifier,
        ));
        let feedback = FeedbackController::new(supervisor.clone(), config.feedback.clone());
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);

        let alert_driver = tokio::spawn(drive_alerts(
            tail.classified_lines(),
            Arc::clone(&audit),
            feedback,
            notifications.clone(),
        ));
        let output_driver = tokio::spawn(drive_gatekeeper_output(
            supervisor.subscribe(),
            Arc::clone(&audit),
        ));

        Self {
            config,
            supervisor,
            tail,
            audit,
            notifications,
            monitor_lock: Mutex::new(()),
            drivers: vec![alert_driver.abort_handle(), output_driver.abort_handle()],
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    /// Validate an operator command and forward it to the limiter.
    ///
    /// Rejected text never reaches the supervisor.
    pub async fn send_command(&self, text: &str) -> Result<Ack, ControlError> {
        let command = command_validator::check(text).map_err(|rejection| {
            warn!(command = ?text, reason = %rejection, "Rejected operator command");
            ControlError::ValidationRejected(rejection)
        })?;

        self.supervisor
            .deliver(WorkerId::Gatekeeper, command.as_str())
            .await?;
        info!(command = %command, "Command sent");
        Ok(Ack::CommandSent)
    }

    /// Spawn the limiter ahead of the first command.
    pub async fn start_gatekeeper(&self) -> Result<Ack, ControlError> {
        if self.supervisor.ensure(WorkerId::Gatekeeper).await? {
            Ok(Ack::Started)
        } else {
            Ok(Ack::AlreadyRunning)
        }
    }

    /// Start the monitor and watch its log.
    ///
    /// The tail starts only after the last handshake line is written.
    pub async fn start_monitor(&self, settings: MonitorSettings) -> Result<Ack, ControlError> {
        let _guard = self.monitor_lock.lock().await;

        if self.supervisor.state(WorkerId::DeepGuard).await == WorkerState::Running {
            return Ok(Ack::AlreadyRunning);
        }

        let key = &self.config.tail.cipher_key;
        if key.is_empty() {
            return Err(ControlError::MissingCipherKey);
        }
        let cipher = build_cipher(self.config.tail.cipher, key)?;

        let log_path =
            std::path::absolute(&settings.log_path).unwrap_or_else(|_| settings.log_path.clone());
        self.supervisor
            .set_startup_sequence(WorkerId::DeepGuard, monitor_handshake(&settings, &log_path))
            .await;
        self.supervisor.ensure(WorkerId::DeepGuard).await?;

        let watch = self.tail.start(&log_path, cipher).await?;
        self.supervisor.bind_watch(WorkerId::DeepGuard, watch).await;

        info!(log_path = %log_path.display(), "Monitor started");
        Ok(Ack::Started)
    }

    /// Kill the monitor and end the watch session.
    pub async fn stop_monitor(&self) -> Ack {
        let _guard = self.monitor_lock.lock().await;
        self.supervisor.stop(WorkerId::DeepGuard).await;
        self.tail.stop().await;
        Ack::Stopped
    }

    /// Raw worker output (display sink).
    pub fn subscribe_to_output(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.supervisor.subscribe()
    }

    /// Decrypted log snapshots, republished on every change.
    pub fn subscribe_to_log(&self) -> broadcast::Receiver<TailEvent> {
        self.tail.subscribe()
    }

    /// One notification per CRITICAL or WARNING line.
    pub fn subscribe_to_alerts(&self) -> broadcast::Receiver<AlertNotification> {
        self.notifications.subscribe()
    }

    pub async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, ControlError> {
        Ok(self.audit.recent_alerts(limit).await?)
    }

    pub async fn recent_decisions(
        &self,
        limit: usize,
    ) -> Result<Vec<GatekeeperLogRecord>, ControlError> {
        Ok(self.audit.recent_gatekeeper_logs(limit).await?)
    }

    /// Stop the watch, both workers, and the drivers.
    pub async fn shutdown(&self) {
        self.tail.stop().await;
        self.supervisor.shutdown().await;
        for driver in &self.drivers {
            driver.abort();
        }
        info!("Control plane shut down");
    }
}

impl Drop for ControlPlane {
    fn drop(&mut self) {
        for driver in &self.drivers {
            driver.abort();
        }
    }
}

async fn drive_alerts(
    lines: impl Stream<Item = ClassifiedLine>,
    audit: Arc<dyn AuditStore>,
    feedback: FeedbackController,
    notifications: broadcast::Sender<AlertNotification>,
) {
    futures::pin_mut!(lines);
    while let Some(ClassifiedLine {
        line,
        classification,
    }) = lines.next().await
    {
        if let Some(level) = classification.level {
            warn!(level = %level, line_index = line.index, message = %line.plaintext, "Monitor alert");

            let store = Arc::clone(&audit);
            let message = line.plaintext.clone();
            tokio::spawn(async move {
                if let Err(e) = store.append_alert(level, &message).await {
                    error!(error = %e, "Failed to persist alert");
                }
            });

            let _ = notifications.send(AlertNotification::new(level, line.plaintext));
        }

        if classification.needs_feedback() {
            feedback.apply(&classification).await;
        }
    }
}

async fn drive_gatekeeper_output(
    mut events: broadcast::Receiver<SupervisorEvent>,
    audit: Arc<dyn AuditStore>,
) {
    loop {
        match events.recv().await {
            Ok(SupervisorEvent::Stdout {
                worker: WorkerId::Gatekeeper,
                line,
            }) => {
                let Some(decision) = parse_decision(&line) else {
                    if is_decision_line(&line) {
                        warn!(line = %line, "Decision line without a user, not recorded");
                    }
                    continue;
                };

                let store = Arc::clone(&audit);
                tokio::spawn(async move {
                    if let Err(e) = store
                        .append_gatekeeper_log(&decision.user_id, decision.status, decision.remaining)
                        .await
                    {
                        error!(error = %e, user_id = %decision.user_id, "Failed to persist limiter decision");
                    }
                });
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Limiter output driver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
