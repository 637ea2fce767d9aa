//! Pure domain services: no I/O, no tasks.

pub mod alert_classifier;
pub mod command_validator;
pub mod gatekeeper_output;

pub use alert_classifier::{AlertClassifier, KeywordClassifier};
pub use command_validator::{Rejection, ValidatedCommand, ALLOWED_VERBS, MAX_COMMAND_LENGTH};
pub use gatekeeper_output::{is_decision_line, parse_decision};
