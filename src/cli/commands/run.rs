//! Interactive session: operator commands on stdin, worker output on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::style;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use super::open_audit_store;
use crate::application::{
    Ack, ControlError, ControlPlane, MonitorSettings, SupervisorEvent, TailEvent,
};
use crate::cli::display::{action_failure, action_success, colorize_level, colorize_worker_state};
use crate::domain::models::{AlertLevel, AlertNotification, Config, DeepGuardConfig, WorkerId, WorkerState};
use crate::domain::ports::{AuditStore, InMemoryAuditStore};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Start the monitor as soon as the session opens
    #[arg(long)]
    pub monitor: bool,

    /// CPU-load threshold answered to the monitor
    #[arg(long)]
    pub cpu: Option<String>,

    /// RAM threshold answered to the monitor
    #[arg(long)]
    pub ram: Option<String>,

    /// Monitor check interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Encrypted log file the monitor writes
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Keep the audit trail in memory only
    #[arg(long)]
    pub ephemeral: bool,
}

impl RunArgs {
    /// Configured monitor settings with command-line overrides applied.
    pub fn monitor_settings(&self, config: &DeepGuardConfig) -> MonitorSettings {
        let mut settings = MonitorSettings::from(config);
        if let Some(cpu) = &self.cpu {
            settings.cpu_threshold.clone_from(cpu);
        }
        if let Some(ram) = &self.ram {
            settings.ram_threshold = Some(ram.clone());
        }
        if let Some(interval) = self.interval {
            settings.interval_secs = interval;
        }
        if let Some(path) = &self.log_path {
            settings.log_path.clone_from(path);
        }
        settings
    }
}

/// One line of session output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum SessionEvent<'a> {
    Ack { message: String },
    Error { message: String },
    Output { worker: WorkerId, stream: &'static str, line: &'a str },
    Alert { title: &'a str, level: AlertLevel, message: &'a str },
    Log { index: usize, plaintext: &'a str },
    Status { worker: WorkerId, state: WorkerState, pid: Option<u32> },
}

fn emit(event: &SessionEvent<'_>, json: bool) {
    if json {
        println!("{}", serde_json::to_string(event).unwrap_or_default());
        return;
    }
    match event {
        SessionEvent::Ack { message } => println!("{}", action_success(message)),
        SessionEvent::Error { message } => println!("{}", action_failure(message)),
        SessionEvent::Output { worker, stream, line } => {
            if *stream == "stderr" {
                println!("{} {}", style(format!("[{worker}!]")).red(), line);
            } else {
                println!("{} {}", style(format!("[{worker}]")).cyan(), line);
            }
        }
        SessionEvent::Alert { title, level, message } => {
            println!("{} {} {}", style(title).bold(), colorize_level(*level), message);
        }
        SessionEvent::Log { index, plaintext } => {
            println!("{} {}", style(format!("[log #{index}]")).dim(), plaintext);
        }
        SessionEvent::Status { worker, state, pid } => {
            let pid = pid.map_or_else(|| "-".to_string(), |p| p.to_string());
            println!("{worker:<12} {:<12} pid {pid}", colorize_worker_state(*state));
        }
    }
}

fn report(result: Result<Ack, ControlError>, json: bool) {
    match result {
        Ok(ack) => emit(&SessionEvent::Ack { message: ack.to_string() }, json),
        Err(e) => emit(&SessionEvent::Error { message: format!("Error: {e}") }, json),
    }
}

pub async fn execute(args: RunArgs, config: Config, json: bool) -> Result<()> {
    let session = Uuid::new_v4();
    info!(session = %session, ephemeral = args.ephemeral, "Session starting");

    let audit: Arc<dyn AuditStore> = if args.ephemeral {
        Arc::new(InMemoryAuditStore::new())
    } else {
        open_audit_store(&config).await?
    };
    let settings = args.monitor_settings(&config.deepguard);
    let plane = ControlPlane::new(config, audit);

    let printer = tokio::spawn(print_events(
        plane.subscribe_to_output(),
        plane.subscribe_to_alerts(),
        plane.subscribe_to_log(),
        json,
    ));

    report(plane.start_gatekeeper().await, json);
    if args.monitor {
        report(plane.start_monitor(settings.clone()).await, json);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&plane, &settings, &line, json).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read operator input");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    plane.shutdown().await;
    printer.abort();
    info!(session = %session, "Session ended");
    Ok(())
}

/// Handle one operator line. Returns `false` when the session should end.
///
/// Lines starting with `:` are session directives; everything else is an
/// operator command for the limiter.
async fn handle_line(
    plane: &ControlPlane,
    settings: &MonitorSettings,
    line: &str,
    json: bool,
) -> bool {
    let line = line.trim_end_matches('\r');
    match line.trim() {
        "" => {}
        ":quit" | ":exit" => return false,
        ":monitor start" => report(plane.start_monitor(settings.clone()).await, json),
        ":monitor stop" => report(Ok(plane.stop_monitor().await), json),
        ":status" => {
            for worker in WorkerId::ALL {
                let supervisor = plane.supervisor();
                emit(
                    &SessionEvent::Status {
                        worker,
                        state: supervisor.state(worker).await,
                        pid: supervisor.pid(worker).await,
                    },
                    json,
                );
            }
        }
        _ => report(plane.send_command(line).await, json),
    }
    true
}

async fn print_events(
    mut output: broadcast::Receiver<SupervisorEvent>,
    mut alerts: broadcast::Receiver<AlertNotification>,
    mut log: broadcast::Receiver<TailEvent>,
    json: bool,
) {
    loop {
        tokio::select! {
            Ok(event) = output.recv() => match event {
                SupervisorEvent::Stdout { worker, line } => {
                    emit(&SessionEvent::Output { worker, stream: "stdout", line: &line }, json);
                }
                SupervisorEvent::Stderr { worker, line } => {
                    emit(&SessionEvent::Output { worker, stream: "stderr", line: &line }, json);
                }
                _ => {}
            },
            Ok(alert) = alerts.recv() => {
                emit(
                    &SessionEvent::Alert { title: &alert.title, level: alert.level, message: &alert.message },
                    json,
                );
            }
            Ok(TailEvent::Snapshot(snapshot)) = log.recv() => {
                for line in &snapshot.new_lines {
                    emit(&SessionEvent::Log { index: line.line.index, plaintext: &line.line.plaintext }, json);
                }
            }
            else => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let args = RunArgs {
            monitor: true,
            cpu: Some("0.9".to_string()),
            ram: None,
            interval: Some(10),
            log_path: Some(PathBuf::from("/tmp/dg.log")),
            ephemeral: true,
        };
        let settings = args.monitor_settings(&DeepGuardConfig::default());

        assert_eq!(settings.cpu_threshold, "0.9");
        assert_eq!(settings.ram_threshold.as_deref(), Some("80.0"));
        assert_eq!(settings.interval_secs, 10);
        assert_eq!(settings.log_path, PathBuf::from("/tmp/dg.log"));
    }

    #[test]
    fn test_session_event_json_shape() {
        let event = SessionEvent::Output {
            worker: WorkerId::Gatekeeper,
            stream: "stdout",
            line: "[ALLOWED] Request logged for alice | Remaining: 9/10",
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "output");
        assert_eq!(value["worker"], "gatekeeper");
    }
}
