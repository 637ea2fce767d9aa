#![cfg(unix)]

#[macro_use]
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use guardpost::application::MonitorSettings;
use guardpost::domain::models::CipherKind;
use guardpost::infrastructure::crypto::build_cipher;
use guardpost::services::Rejection;
use guardpost::{
    Ack, AlertLevel, ControlError, ControlPlane, DecisionStatus, InMemoryAuditStore, WorkerId,
    WorkerState,
};

use helpers::{read_lines, test_config, CIPHER_KEY};

fn append_encrypted(path: &std::path::Path, lines: &[&str]) {
    use std::io::Write;

    let cipher = build_cipher(CipherKind::AesCbc, CIPHER_KEY).unwrap();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    for line in lines {
        writeln!(file, "{}", cipher.encrypt_line(line).unwrap()).unwrap();
    }
}

#[tokio::test]
async fn test_operator_command_reaches_limiter_and_decision_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let plane = ControlPlane::new(test_config(dir.path()), Arc::new(InMemoryAuditStore::new()));

    let ack = plane.send_command("check alice").await.unwrap();
    assert_eq!(ack, Ack::CommandSent);
    assert_eq!(ack.to_string(), "Command sent");

    assert!(eventually!(!plane.recent_decisions(50).await.unwrap().is_empty()));
    let decisions = plane.recent_decisions(50).await.unwrap();
    assert_eq!(decisions[0].user_id, "alice");
    assert_eq!(decisions[0].status, DecisionStatus::Allowed);
    assert_eq!(decisions[0].remaining, Some(9));

    let received = read_lines(&dir.path().join("received.log"));
    assert_eq!(received, vec!["100", "60", "check alice"]);

    plane.shutdown().await;
}

#[tokio::test]
async fn test_rejected_command_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let plane = ControlPlane::new(test_config(dir.path()), Arc::new(InMemoryAuditStore::new()));

    let err = plane.send_command("drop alice").await.unwrap_err();
    assert!(matches!(err, ControlError::ValidationRejected(Rejection::UnknownVerb)));

    let err = plane.send_command("throttle 0.2").await.unwrap_err();
    assert!(matches!(err, ControlError::ValidationRejected(_)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!dir.path().join("spawns.log").exists());
    assert_eq!(
        plane.supervisor().state(WorkerId::Gatekeeper).await,
        WorkerState::NotStarted
    );
}

#[tokio::test]
async fn test_monitor_handshake_and_double_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let settings = MonitorSettings::from(&config.deepguard);
    let log_path = settings.log_path.clone();
    let plane = ControlPlane::new(config, Arc::new(InMemoryAuditStore::new()));

    assert_eq!(plane.start_monitor(settings.clone()).await.unwrap(), Ack::Started);
    assert_eq!(
        plane.start_monitor(settings).await.unwrap(),
        Ack::AlreadyRunning
    );
    assert!(log_path.exists(), "log file is created before watching");

    let handshake = dir.path().join("handshake.log");
    assert!(eventually!(read_lines(&handshake).len() == 5));
    assert_eq!(
        read_lines(&handshake),
        vec![
            "0.5".to_string(),
            "80.0".to_string(),
            log_path.to_string_lossy().into_owned(),
            "5".to_string(),
            CIPHER_KEY.to_string(),
        ]
    );

    assert_eq!(plane.stop_monitor().await, Ack::Stopped);
    assert_eq!(
        plane.supervisor().state(WorkerId::DeepGuard).await,
        WorkerState::Stopped
    );
}

#[tokio::test]
async fn test_pressure_alert_throttles_and_recovery_restores() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let settings = MonitorSettings::from(&config.deepguard);
    let log_path = settings.log_path.clone();
    let plane = ControlPlane::new(config, Arc::new(InMemoryAuditStore::new()));
    let mut notifications = plane.subscribe_to_alerts();

    plane.start_monitor(settings).await.unwrap();
    append_encrypted(&log_path, &["CRITICAL CPU Load 95%"]);

    let notification = tokio::time::timeout(Duration::from_secs(10), notifications.recv())
        .await
        .expect("no alert notification")
        .unwrap();
    assert_eq!(notification.title, "DeepGuard Alert");
    assert_eq!(notification.level, AlertLevel::Critical);
    assert_eq!(notification.message, "CRITICAL CPU Load 95%");

    assert!(eventually!(plane.recent_alerts(50).await.unwrap().len() == 1));
    let alerts = plane.recent_alerts(50).await.unwrap();
    assert_eq!(alerts[0].level, AlertLevel::Critical);
    assert_eq!(alerts[0].message, "CRITICAL CPU Load 95%");

    let received = dir.path().join("received.log");
    assert!(eventually!(read_lines(&received).contains(&"throttle 0.2".to_string())));

    append_encrypted(&log_path, &["System OK"]);
    assert!(eventually!(read_lines(&received).contains(&"throttle 1.0".to_string())));

    assert_eq!(
        read_lines(&received),
        vec!["100", "60", "throttle 0.2", "throttle 1.0"]
    );
    // Recovery is not an alert.
    assert_eq!(plane.recent_alerts(50).await.unwrap().len(), 1);

    plane.shutdown().await;
}

#[tokio::test]
async fn test_stopped_monitor_is_no_longer_tailed() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let settings = MonitorSettings::from(&config.deepguard);
    let log_path = settings.log_path.clone();
    let plane = ControlPlane::new(config, Arc::new(InMemoryAuditStore::new()));

    plane.start_monitor(settings).await.unwrap();
    plane.stop_monitor().await;

    append_encrypted(&log_path, &["WARNING RAM 91%"]);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(plane.recent_alerts(50).await.unwrap().is_empty());
    assert!(!dir.path().join("received.log").exists());
}

#[tokio::test]
async fn test_missing_key_blocks_monitor_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.tail.cipher_key.clear();
    let settings = MonitorSettings::from(&config.deepguard);
    let plane = ControlPlane::new(config, Arc::new(InMemoryAuditStore::new()));

    let err = plane.start_monitor(settings).await.unwrap_err();
    assert!(matches!(err, ControlError::MissingCipherKey));
    assert!(!dir.path().join("handshake.log").exists());
}
