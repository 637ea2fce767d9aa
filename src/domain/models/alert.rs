use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a monitor alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Critical,
    Warning,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRITICAL" => Ok(Self::Critical),
            "WARNING" => Ok(Self::Warning),
            other => Err(format!("unknown alert level: {other}")),
        }
    }
}

/// Tags derived from one decrypted log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub level: Option<AlertLevel>,
    pub resource_pressure: bool,
    pub recovery: bool,
}

impl Classification {
    /// Whether the line should be persisted and raised as a notification.
    pub fn is_alert(&self) -> bool {
        self.level.is_some()
    }

    /// Whether the line asks anything of the feedback loop.
    pub fn needs_feedback(&self) -> bool {
        self.resource_pressure || self.recovery
    }
}

/// A persisted monitor alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    pub message: String,
}

/// A ciphertext line together with its plaintext. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedLine {
    pub index: usize,
    pub ciphertext: String,
    pub plaintext: String,
}

/// A decrypted line seen for the first time in the current watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub line: DecryptedLine,
    pub classification: Classification,
}

/// Desktop-style notification raised for every alert line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub title: String,
    pub level: AlertLevel,
    pub message: String,
}

impl AlertNotification {
    pub fn new(level: AlertLevel, message: impl Into<String>) -> Self {
        Self {
            title: "DeepGuard Alert".to_string(),
            level,
            message: message.into(),
        }
    }
}
