use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

/// Multiplier the limiter applies to its request budget.
///
/// Always carries an explicit value; nothing remembers what the limiter was
/// last told.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrottleDirective {
    multiplier: f64,
}

impl ThrottleDirective {
    /// Multiplier restoring the full budget.
    pub const FULL: f64 = 1.0;

    pub fn new(multiplier: f64) -> DomainResult<Self> {
        if !(0.0..=1.0).contains(&multiplier) {
            return Err(DomainError::ValidationFailed(format!(
                "throttle multiplier {multiplier} outside [0, 1]"
            )));
        }
        Ok(Self { multiplier })
    }

    pub fn restore() -> Self {
        Self {
            multiplier: Self::FULL,
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Wire form sent to the limiter's stdin, e.g. `throttle 0.2`.
    pub fn to_command(&self) -> String {
        format!("throttle {}", format_multiplier(self.multiplier))
    }
}

impl fmt::Display for ThrottleDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command())
    }
}

/// Always keeps a fractional part so `1` goes out as `1.0`.
fn format_multiplier(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}
