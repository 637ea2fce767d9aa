//! Incremental tail of the monitor's encrypted alert log.
//!
//! A polling task watches the file's size and modification time. On change it
//! re-reads the whole file, decrypts every record for the plaintext view, and
//! classifies only the records past the cursor.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::stream::{self, Stream};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::models::{ClassifiedLine, DecryptedLine};
use crate::infrastructure::crypto::{decrypt_or_placeholder, LineCipher};
use crate::services::alert_classifier::AlertClassifier;

const EVENT_BUFFER: usize = 64;

/// Tail error types
#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to prepare log file {}: {source}", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bookmark of how far the log has been classified in one watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCursor {
    pub path: PathBuf,
    pub last_processed_line_count: usize,
    pub last_known_size: u64,
}

impl LogCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_processed_line_count: 0,
            last_known_size: 0,
        }
    }

    pub fn reset(&mut self) {
        self.last_processed_line_count = 0;
        self.last_known_size = 0;
    }
}

/// Result of processing one change of the log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailSnapshot {
    /// Every record decrypted, in file order.
    pub plaintext: Vec<String>,
    /// Records past the cursor, classified.
    pub new_lines: Vec<ClassifiedLine>,
}

/// Events published by the tail task
#[derive(Debug, Clone)]
pub enum TailEvent {
    Snapshot(TailSnapshot),
    /// The watch session ended through `stop`.
    Stopped,
}

/// Split file contents into trimmed, non-empty records.
pub fn split_records(contents: &str) -> Vec<&str> {
    contents
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Text up to and including the last newline.
///
/// Anything after it is a record the monitor is still writing.
pub fn complete_records(contents: &str) -> &str {
    contents.rfind('\n').map_or("", |end| &contents[..=end])
}

/// Advance `cursor` over `contents`, classifying only unseen records.
///
/// Only newline-terminated records are processed; a trailing fragment is left
/// for a later snapshot. A record count below the cursor, or a file smaller
/// than last seen, is a truncation or rotation: the cursor restarts at 0 and
/// every current record counts as new.
pub fn process_snapshot(
    cursor: &mut LogCursor,
    contents: &str,
    size: u64,
    cipher: &dyn LineCipher,
    classifier: &dyn AlertClassifier,
) -> TailSnapshot {
    let records = split_records(complete_records(contents));

    if records.len() < cursor.last_processed_line_count || size < cursor.last_known_size {
        info!(
            path = %cursor.path.display(),
            lines = records.len(),
            previous_lines = cursor.last_processed_line_count,
            "Log truncated or rotated, resetting cursor"
        );
        cursor.reset();
    }

    let start = cursor.last_processed_line_count;
    let mut plaintext = Vec::with_capacity(records.len());
    let mut new_lines = Vec::with_capacity(records.len().saturating_sub(start));

    for (index, record) in records.iter().enumerate() {
        let text = decrypt_or_placeholder(cipher, record);
        if index >= start {
            let classification = classifier.classify(&text);
            debug!(line_index = index, ?classification, "Classified log line");
            new_lines.push(ClassifiedLine {
                line: DecryptedLine {
                    index,
                    ciphertext: (*record).to_string(),
                    plaintext: text.clone(),
                },
                classification,
            });
        }
        plaintext.push(text);
    }

    cursor.last_processed_line_count = records.len();
    cursor.last_known_size = size;

    TailSnapshot {
        plaintext,
        new_lines,
    }
}

/// Polling tail of one encrypted log file at a time (`Idle` ⇄ `Watching`).
pub struct SecureLogTail {
    poll_interval: Duration,
    classifier: Arc<dyn AlertClassifier>,
    events: broadcast::Sender<TailEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SecureLogTail {
    pub fn new(poll_interval: Duration, classifier: Arc<dyn AlertClassifier>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            poll_interval,
            classifier,
            events,
            task: Mutex::new(None),
        }
    }

    /// Start watching `path`, replacing any current session.
    ///
    /// The file and its parent directories are created when absent. The
    /// returned handle aborts the session when the owning worker stops.
    pub async fn start(
        &self,
        path: impl Into<PathBuf>,
        cipher: Arc<dyn LineCipher>,
    ) -> Result<AbortHandle, TailError> {
        let path = path.into();
        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        prepare_file(&path)
            .await
            .map_err(|source| TailError::Prepare {
                path: path.clone(),
                source,
            })?;

        let baseline = observe(&path).await;
        let handle = tokio::spawn(watch_loop(
            LogCursor::new(path.clone()),
            baseline,
            self.poll_interval,
            cipher,
            Arc::clone(&self.classifier),
            self.events.clone(),
        ));
        let abort = handle.abort_handle();
        *task = Some(handle);

        info!(path = %path.display(), interval_ms = self.poll_interval.as_millis() as u64, "Log tail started");
        Ok(abort)
    }

    /// End the session. Any in-flight read is dropped.
    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            info!("Log tail stopped");
            let _ = self.events.send(TailEvent::Stopped);
        }
    }

    pub async fn is_watching(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Subscribe to snapshots of every change
    pub fn subscribe(&self) -> broadcast::Receiver<TailEvent> {
        self.events.subscribe()
    }

    /// Lazy stream of newly classified lines across all sessions.
    ///
    /// Ends only when the tail itself is dropped. A subscriber that falls too
    /// far behind skips the lines it missed.
    pub fn classified_lines(&self) -> impl Stream<Item = ClassifiedLine> + Send + 'static {
        let rx = self.events.subscribe();
        stream::unfold((rx, VecDeque::new()), |(mut rx, mut pending)| async move {
            loop {
                if let Some(line) = pending.pop_front() {
                    return Some((line, (rx, pending)));
                }
                match rx.recv().await {
                    Ok(TailEvent::Snapshot(snapshot)) => pending.extend(snapshot.new_lines),
                    Ok(TailEvent::Stopped) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Classified line subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}

impl Drop for SecureLogTail {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

type Observation = Option<(Option<SystemTime>, u64)>;

async fn prepare_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(())
}

async fn observe(path: &Path) -> Observation {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Some((meta.modified().ok(), meta.len())),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to stat log file");
            None
        }
    }
}

async fn watch_loop(
    mut cursor: LogCursor,
    mut last_seen: Observation,
    poll_interval: Duration,
    cipher: Arc<dyn LineCipher>,
    classifier: Arc<dyn AlertClassifier>,
    events: broadcast::Sender<TailEvent>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let current = observe(&cursor.path).await;
        if current.is_none() || current == last_seen {
            continue;
        }

        let bytes = match tokio::fs::read(&cursor.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %cursor.path.display(), error = %e, "Failed to read log file, retrying next tick");
                continue;
            }
        };
        last_seen = current;

        let contents = String::from_utf8_lossy(&bytes);
        let snapshot = process_snapshot(
            &mut cursor,
            &contents,
            bytes.len() as u64,
            cipher.as_ref(),
            classifier.as_ref(),
        );
        debug!(
            lines = snapshot.plaintext.len(),
            new_lines = snapshot.new_lines.len(),
            "Log change processed"
        );
        let _ = events.send(TailEvent::Snapshot(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AlertLevel, CipherKind, Classification};
    use crate::infrastructure::crypto::build_cipher;
    use crate::services::alert_classifier::KeywordClassifier;
    use futures::StreamExt;

    fn cipher() -> Arc<dyn LineCipher> {
        build_cipher(CipherKind::AesCbc, "test-secret").unwrap()
    }

    fn encrypt_all(cipher: &dyn LineCipher, lines: &[&str]) -> String {
        lines
            .iter()
            .map(|l| cipher.encrypt_line(l).unwrap() + "\n")
            .collect()
    }

    #[test]
    fn test_split_records_trims_and_drops_empty() {
        assert_eq!(split_records(" ab \n\n\r\ncd\n"), vec!["ab", "cd"]);
        assert!(split_records("").is_empty());
    }

    #[test]
    fn test_only_new_lines_are_classified() {
        let cipher = cipher();
        let classifier = KeywordClassifier::new();
        let mut cursor = LogCursor::new("/tmp/alerts.log");

        let first = encrypt_all(cipher.as_ref(), &["boot", "CRITICAL CPU Load 95%"]);
        let snap = process_snapshot(&mut cursor, &first, first.len() as u64, cipher.as_ref(), &classifier);
        assert_eq!(snap.new_lines.len(), 2);
        assert_eq!(snap.new_lines[1].classification.level, Some(AlertLevel::Critical));
        assert_eq!(cursor.last_processed_line_count, 2);

        let second = first.clone() + &encrypt_all(cipher.as_ref(), &["System OK"]);
        let snap = process_snapshot(&mut cursor, &second, second.len() as u64, cipher.as_ref(), &classifier);
        assert_eq!(snap.plaintext, vec!["boot", "CRITICAL CPU Load 95%", "System OK"]);
        assert_eq!(snap.new_lines.len(), 1);
        assert_eq!(snap.new_lines[0].line.index, 2);
        assert!(snap.new_lines[0].classification.recovery);
    }

    #[test]
    fn test_unchanged_contents_never_reclassify() {
        let cipher = cipher();
        let classifier = KeywordClassifier::new();
        let mut cursor = LogCursor::new("/tmp/alerts.log");
        let contents = encrypt_all(cipher.as_ref(), &["WARNING RAM 90%"]);

        process_snapshot(&mut cursor, &contents, contents.len() as u64, cipher.as_ref(), &classifier);
        for _ in 0..3 {
            let snap = process_snapshot(&mut cursor, &contents, contents.len() as u64, cipher.as_ref(), &classifier);
            assert!(snap.new_lines.is_empty());
            assert_eq!(snap.plaintext.len(), 1);
        }
    }

    #[test]
    fn test_truncation_resets_cursor() {
        let cipher = cipher();
        let classifier = KeywordClassifier::new();
        let mut cursor = LogCursor::new("/tmp/alerts.log");

        let long = encrypt_all(cipher.as_ref(), &["a", "b", "c"]);
        process_snapshot(&mut cursor, &long, long.len() as u64, cipher.as_ref(), &classifier);

        let rotated = encrypt_all(cipher.as_ref(), &["WARNING Load high"]);
        let snap = process_snapshot(&mut cursor, &rotated, rotated.len() as u64, cipher.as_ref(), &classifier);
        assert_eq!(snap.new_lines.len(), 1);
        assert_eq!(snap.new_lines[0].line.index, 0);
        assert!(snap.new_lines[0].classification.resource_pressure);
        assert_eq!(cursor.last_processed_line_count, 1);
    }

    #[test]
    fn test_shrunk_file_with_same_line_count_resets_cursor() {
        let cipher = cipher();
        let classifier = KeywordClassifier::new();
        let mut cursor = LogCursor::new("/tmp/alerts.log");

        let long = encrypt_all(
            cipher.as_ref(),
            &[
                "boot sequence finished with a rather long status message",
                "sensor calibration complete after a long warm-up period",
                "monitoring loop entered with every probe reporting nominal",
            ],
        );
        process_snapshot(&mut cursor, &long, long.len() as u64, cipher.as_ref(), &classifier);
        assert_eq!(cursor.last_processed_line_count, 3);

        let short = encrypt_all(cipher.as_ref(), &["a", "CRITICAL RAM 97%", "System OK"]);
        assert!(short.len() < long.len());
        let snap = process_snapshot(&mut cursor, &short, short.len() as u64, cipher.as_ref(), &classifier);

        let indices: Vec<_> = snap.new_lines.iter().map(|l| l.line.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(snap.new_lines[1].classification.resource_pressure);
        assert!(snap.new_lines[2].classification.recovery);
        assert_eq!(cursor.last_known_size, short.len() as u64);
    }

    #[test]
    fn test_partial_record_waits_for_its_newline() {
        let cipher = cipher();
        let classifier = KeywordClassifier::new();
        let mut cursor = LogCursor::new("/tmp/alerts.log");

        let full = encrypt_all(cipher.as_ref(), &["CRITICAL CPU Load 95%"]);
        let half = &full[..full.len() / 2];

        let snap = process_snapshot(&mut cursor, half, half.len() as u64, cipher.as_ref(), &classifier);
        assert!(snap.new_lines.is_empty());
        assert!(snap.plaintext.is_empty());
        assert_eq!(cursor.last_processed_line_count, 0);

        let snap = process_snapshot(&mut cursor, &full, full.len() as u64, cipher.as_ref(), &classifier);
        assert_eq!(snap.new_lines.len(), 1);
        assert_eq!(snap.new_lines[0].line.plaintext, "CRITICAL CPU Load 95%");
        assert_eq!(snap.new_lines[0].classification.level, Some(AlertLevel::Critical));
        assert_eq!(cursor.last_processed_line_count, 1);
    }

    #[test]
    fn test_complete_records_drops_trailing_fragment() {
        assert_eq!(complete_records("ab\ncd"), "ab\n");
        assert_eq!(complete_records("ab\ncd\n"), "ab\ncd\n");
        assert_eq!(complete_records("abcd"), "");
    }

    #[test]
    fn test_bad_record_yields_placeholder_and_continues() {
        let cipher = cipher();
        let classifier = KeywordClassifier::new();
        let mut cursor = LogCursor::new("/tmp/alerts.log");
        let contents = format!("zz-not-hex\n{}", encrypt_all(cipher.as_ref(), &["System OK"]));

        let snap = process_snapshot(&mut cursor, &contents, contents.len() as u64, cipher.as_ref(), &classifier);
        assert!(snap.plaintext[0].starts_with("[Decryption Error:"));
        assert_eq!(snap.plaintext[1], "System OK");
        assert_eq!(snap.new_lines[0].classification, Classification::default());
        assert!(snap.new_lines[1].classification.recovery);
    }

    #[tokio::test]
    async fn test_watch_picks_up_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/alerts.log");
        let cipher = cipher();
        let tail = SecureLogTail::new(Duration::from_millis(20), Arc::new(KeywordClassifier::new()));
        let mut lines = Box::pin(tail.classified_lines());

        tail.start(&path, Arc::clone(&cipher)).await.unwrap();
        assert!(path.exists(), "start should create the log file");
        assert!(tail.is_watching().await);

        let record = encrypt_all(cipher.as_ref(), &["CRITICAL CPU Load 99%"]);
        tokio::fs::write(&path, record).await.unwrap();

        let line = tokio::time::timeout(Duration::from_secs(5), lines.next())
            .await
            .expect("timed out waiting for classified line")
            .expect("stream ended");
        assert_eq!(line.line.plaintext, "CRITICAL CPU Load 99%");
        assert!(line.classification.resource_pressure);

        tail.stop().await;
        assert!(!tail.is_watching().await);
    }
}
