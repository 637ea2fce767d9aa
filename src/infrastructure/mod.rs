//! Infrastructure layer module
//!
//! Adapters to the outside world that the application layer is wired with:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Log record encryption

pub mod config;
pub mod crypto;
pub mod logging;
