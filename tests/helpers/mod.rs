//! Shared fixtures: fake worker scripts and a scratch configuration.
#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use guardpost::Config;

pub const CIPHER_KEY: &str = "integration-secret";

/// Records every stdin line to `received.log` next to itself and answers
/// `check`/`status` with decision lines.
pub const GATEKEEPER_SCRIPT: &str = r#"#!/bin/sh
echo spawn >> spawns.log
while IFS= read -r line; do
  printf '%s\n' "$line" >> received.log
  case "$line" in
    "check "*) echo "[ALLOWED] Request logged for ${line#check } | Remaining: 9/10" ;;
    "status "*) echo "[DENIED] Rate limit exceeded for ${line#status } | Remaining: 0/10" ;;
  esac
done
"#;

/// Reads the four handshake answers, records them with the key from the
/// environment, then idles until stdin closes.
pub const DEEPGUARD_SCRIPT: &str = r#"#!/bin/sh
read -r cpu
read -r ram
read -r path
read -r interval
printf '%s\n%s\n%s\n%s\n%s\n' "$cpu" "$ram" "$path" "$interval" "$MONITOR_KEY" > handshake.log
while read -r _; do :; done
"#;

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

/// Configuration pointing both workers at fake scripts inside `dir`.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.gatekeeper.executable = write_script(dir, "gatekeeper", GATEKEEPER_SCRIPT)
        .to_string_lossy()
        .into_owned();
    config.deepguard.executable = write_script(dir, "deepguard", DEEPGUARD_SCRIPT)
        .to_string_lossy()
        .into_owned();
    config.deepguard.log_path = dir.join("logs/alerts.log").to_string_lossy().into_owned();
    config.deepguard.prompt_delay_ms = 10;
    config.tail.poll_interval_ms = 20;
    config.tail.cipher_key = CIPHER_KEY.to_string();
    config
}

/// Lines of a file, or nothing if it does not exist yet.
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Poll `$cond` until it holds or ten seconds pass; evaluates to whether it held.
macro_rules! eventually {
    ($cond:expr) => {{
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            if $cond {
                break true;
            }
            if tokio::time::Instant::now() >= deadline {
                break false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
    }};
}
