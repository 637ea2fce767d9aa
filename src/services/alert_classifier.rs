//! Severity tagging of decrypted monitor lines.
//!
//! The monitor writes free text, so the default classifier matches on
//! keywords. Callers depend on the [`AlertClassifier`] trait only, which lets a
//! structured log format replace the keyword rules later.

use crate::domain::models::{AlertLevel, Classification};

/// Maps one plaintext line to alert tags. Implementations must be pure.
pub trait AlertClassifier: Send + Sync {
    fn classify(&self, plaintext: &str) -> Classification;
}

/// Substring rules matching what the monitor prints today.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    critical_marker: &'static str,
    warning_marker: &'static str,
    resource_keywords: &'static [&'static str],
    recovery_sentinel: &'static str,
}

impl KeywordClassifier {
    pub const fn new() -> Self {
        Self {
            critical_marker: "CRITICAL",
            warning_marker: "WARNING",
            resource_keywords: &["Load", "RAM"],
            recovery_sentinel: "System OK",
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertClassifier for KeywordClassifier {
    fn classify(&self, plaintext: &str) -> Classification {
        // CRITICAL wins when both markers appear.
        let level = if plaintext.contains(self.critical_marker) {
            Some(AlertLevel::Critical)
        } else if plaintext.contains(self.warning_marker) {
            Some(AlertLevel::Warning)
        } else {
            None
        };

        let resource_pressure = level.is_some()
            && self
                .resource_keywords
                .iter()
                .any(|keyword| plaintext.contains(keyword));

        Classification {
            level,
            resource_pressure,
            recovery: plaintext.contains(self.recovery_sentinel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Classification {
        KeywordClassifier::new().classify(text)
    }

    #[test]
    fn test_critical_cpu_load_is_pressure() {
        let c = classify("CRITICAL CPU Load 95%");
        assert_eq!(c.level, Some(AlertLevel::Critical));
        assert!(c.resource_pressure);
        assert!(!c.recovery);
    }

    #[test]
    fn test_warning_ram_is_pressure() {
        let c = classify("[12:00:01] WARNING: RAM usage 85.2%");
        assert_eq!(c.level, Some(AlertLevel::Warning));
        assert!(c.resource_pressure);
    }

    #[test]
    fn test_critical_wins_over_warning() {
        let c = classify("WARNING escalated to CRITICAL: disk");
        assert_eq!(c.level, Some(AlertLevel::Critical));
        assert!(!c.resource_pressure, "no resource keyword present");
    }

    #[test]
    fn test_resource_keyword_without_severity_is_not_pressure() {
        let c = classify("INFO Load 0.3 RAM 40%");
        assert_eq!(c.level, None);
        assert!(!c.resource_pressure);
    }

    #[test]
    fn test_recovery_is_independent_of_severity() {
        let plain = classify("System OK");
        assert!(plain.recovery);
        assert_eq!(plain.level, None);

        let mixed = classify("WARNING RAM spike cleared, System OK");
        assert!(mixed.recovery);
        assert!(mixed.resource_pressure);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let c = classify("critical cpu load, system ok");
        assert_eq!(c, Classification::default());
    }

    #[test]
    fn test_decryption_placeholder_is_inert() {
        let c = classify("[Decryption Error: bad decrypt]");
        assert_eq!(c, Classification::default());
    }
}
