//! Domain layer for Guardpost
//!
//! Worker, alert, and audit models plus the ports infrastructure adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
