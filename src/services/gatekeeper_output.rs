//! Parsing of limiter stdout.
//!
//! Decision lines look like
//! `[ALLOWED] Request logged for alice | Remaining: 9/10`; every other line is
//! display-only.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::models::{DecisionStatus, GatekeeperDecision};

const ALLOWED_MARKER: &str = "[ALLOWED]";
const DENIED_MARKER: &str = "[DENIED]";

fn user_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"for\s+([^\s|]+)").unwrap_or_else(|e| panic!("user pattern is invalid: {e}"))
    })
}

fn remaining_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Remaining:\s+(\d+)")
            .unwrap_or_else(|e| panic!("remaining pattern is invalid: {e}"))
    })
}

/// Whether the line carries a limiter decision marker.
pub fn is_decision_line(line: &str) -> bool {
    line.contains(ALLOWED_MARKER) || line.contains(DENIED_MARKER)
}

/// Extract a decision from one stdout line.
///
/// Returns `None` for lines without a marker or without a user. A missing or
/// unparseable remaining count is kept as `None` rather than dropping the line.
pub fn parse_decision(line: &str) -> Option<GatekeeperDecision> {
    if !is_decision_line(line) {
        return None;
    }
    let status = if line.contains(ALLOWED_MARKER) {
        DecisionStatus::Allowed
    } else {
        DecisionStatus::Denied
    };

    let user_id = user_pattern().captures(line)?.get(1)?.as_str().to_string();
    let remaining = remaining_pattern()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok());

    Some(GatekeeperDecision {
        user_id,
        status,
        remaining,
    })
}
