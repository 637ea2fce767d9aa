//! Severity and status color mapping for CLI output.
//!
//! `console` disables styling automatically when stdout is not a terminal.

use console::{style, StyledObject};

use crate::domain::models::{AlertLevel, DecisionStatus, WorkerState};

/// CRITICAL = red bold, WARNING = yellow.
pub fn colorize_level(level: AlertLevel) -> StyledObject<&'static str> {
    match level {
        AlertLevel::Critical => style(level.as_str()).red().bold(),
        AlertLevel::Warning => style(level.as_str()).yellow(),
    }
}

/// ALLOWED = green, DENIED = red.
pub fn colorize_decision(status: DecisionStatus) -> StyledObject<&'static str> {
    match status {
        DecisionStatus::Allowed => style(status.as_str()).green(),
        DecisionStatus::Denied => style(status.as_str()).red().bold(),
    }
}

pub fn colorize_worker_state(state: WorkerState) -> StyledObject<String> {
    let text = state.to_string();
    match state {
        WorkerState::Running => style(text).green().bold(),
        WorkerState::Crashed => style(text).red().bold(),
        WorkerState::Stopped => style(text).dim(),
        WorkerState::NotStarted => style(text).white(),
    }
}
