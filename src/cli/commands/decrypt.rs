use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::configured_cipher;
use crate::application::secure_log_tail::{process_snapshot, LogCursor};
use crate::cli::display::{colorize_level, list_table, output, render_list, CommandOutput};
use crate::domain::models::{AlertLevel, Config};
use crate::infrastructure::crypto::LineCipher;
use crate::services::alert_classifier::KeywordClassifier;

#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Encrypted log file written by the monitor
    pub file: PathBuf,

    /// Only show CRITICAL and WARNING lines
    #[arg(long)]
    pub alerts_only: bool,
}

#[derive(Debug, Serialize)]
pub struct DecryptedEntry {
    pub index: usize,
    pub level: Option<AlertLevel>,
    pub resource_pressure: bool,
    pub recovery: bool,
    pub plaintext: String,
}

#[derive(Debug, Serialize)]
pub struct DecryptedLog {
    pub path: PathBuf,
    pub entries: Vec<DecryptedEntry>,
}

impl CommandOutput for DecryptedLog {
    fn to_human(&self) -> String {
        let mut table = list_table(&["#", "level", "flags", "plaintext"]);
        for entry in &self.entries {
            let mut flags = Vec::new();
            if entry.resource_pressure {
                flags.push("pressure");
            }
            if entry.recovery {
                flags.push("recovery");
            }
            table.add_row(vec![
                entry.index.to_string(),
                entry
                    .level
                    .map_or_else(|| "-".to_string(), |l| colorize_level(l).to_string()),
                flags.join(","),
                entry.plaintext.clone(),
            ]);
        }
        render_list("line", &table, self.entries.len())
    }
}

pub async fn execute(args: DecryptArgs, config: &Config, json: bool) -> Result<()> {
    let cipher = configured_cipher(config)?;
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let entries = decrypt_entries(&bytes, cipher.as_ref(), args.alerts_only);
    output(
        &DecryptedLog {
            path: args.file,
            entries,
        },
        json,
    );
    Ok(())
}

fn decrypt_entries(bytes: &[u8], cipher: &dyn LineCipher, alerts_only: bool) -> Vec<DecryptedEntry> {
    // The file is at rest, so an unterminated last record is complete.
    let mut contents = String::from_utf8_lossy(bytes).into_owned();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }

    let mut cursor = LogCursor::new("");
    let snapshot = process_snapshot(
        &mut cursor,
        &contents,
        bytes.len() as u64,
        cipher,
        &KeywordClassifier::new(),
    );

    snapshot
        .new_lines
        .into_iter()
        .filter(|l| !alerts_only || l.classification.is_alert())
        .map(|l| DecryptedEntry {
            index: l.line.index,
            level: l.classification.level,
            resource_pressure: l.classification.resource_pressure,
            recovery: l.classification.recovery,
            plaintext: l.line.plaintext,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::CipherKind;
    use crate::infrastructure::crypto::build_cipher;

    #[test]
    fn test_unterminated_last_record_is_decrypted() {
        let cipher = build_cipher(CipherKind::AesCbc, "test-secret").unwrap();
        let contents = format!(
            "{}\n{}",
            cipher.encrypt_line("System OK").unwrap(),
            cipher.encrypt_line("WARNING RAM 91%").unwrap()
        );

        let entries = decrypt_entries(contents.as_bytes(), cipher.as_ref(), false);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].plaintext, "WARNING RAM 91%");
        assert_eq!(entries[1].level, Some(AlertLevel::Warning));

        let alerts = decrypt_entries(contents.as_bytes(), cipher.as_ref(), true);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].index, 1);
    }
}
