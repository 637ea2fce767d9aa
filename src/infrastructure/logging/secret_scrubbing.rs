use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(monitor_key|cipher_key)\s*[:=]\s*\S+")
            .unwrap_or_else(|e| panic!("secret assignment pattern is invalid: {e}"))
    })
}

/// Redacts the shared log secret from text before it is logged.
///
/// Worker output and configuration dumps pass through here so the monitor key
/// never lands in a log file.
#[derive(Clone, Default)]
pub struct SecretScrubber {
    secrets: Vec<String>,
}

impl SecretScrubber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also redact this literal value wherever it appears.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    /// Scrub a message of sensitive data
    pub fn scrub_message(&self, message: &str) -> String {
        let mut scrubbed = assignment_pattern()
            .replace_all(message, "$1=[REDACTED]")
            .to_string();
        for secret in &self.secrets {
            scrubbed = scrubbed.replace(secret.as_str(), "[REDACTED]");
        }
        scrubbed
    }
}

impl fmt::Debug for SecretScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretScrubber")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_env_assignment() {
        let scrubber = SecretScrubber::new();
        let scrubbed = scrubber.scrub_message("starting with MONITOR_KEY=hunter2 in env");

        assert!(!scrubbed.contains("hunter2"));
        assert!(scrubbed.contains("MONITOR_KEY=[REDACTED]"));
    }

    #[test]
    fn test_scrub_yaml_field() {
        let scrubber = SecretScrubber::new();
        let scrubbed = scrubber.scrub_message("cipher_key: s3cr3t-value");

        assert!(!scrubbed.contains("s3cr3t-value"));
        assert!(scrubbed.contains("[REDACTED]"));
    }

    #[test]
    fn test_scrub_literal_secret() {
        let scrubber = SecretScrubber::new().with_secret("correct-horse");
        let scrubbed = scrubber.scrub_message("deepguard: using key correct-horse for log");

        assert_eq!(scrubbed, "deepguard: using key [REDACTED] for log");
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let scrubber = SecretScrubber::new().with_secret("");
        let message = "This is a normal log message with no secrets";

        assert_eq!(scrubber.scrub_message(message), message);
    }

    #[test]
    fn test_debug_does_not_print_secrets() {
        let scrubber = SecretScrubber::new().with_secret("topsecret");
        assert!(!format!("{scrubber:?}").contains("topsecret"));
    }
}
