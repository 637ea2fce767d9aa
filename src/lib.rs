//! Guardpost - worker supervisor with an encrypted alert feedback loop
//!
//! Guardpost supervises two external workers: a request-rate limiter
//! (Gatekeeper) and a resource-health monitor (DeepGuard). It forwards
//! validated operator commands to the limiter, tails and decrypts the
//! monitor's encrypted log, classifies alerts, keeps an audit trail, and
//! throttles the limiter while the host is under pressure.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the audit store port
//! - **Service Layer** (`services`): pure validation, classification and parsing
//! - **Application Layer** (`application`): supervisor, log tail, feedback, control plane
//! - **Adapters** (`adapters`): SQLite audit store
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, encryption
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use guardpost::{ConfigLoader, ControlPlane, InMemoryAuditStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let plane = ControlPlane::new(config, Arc::new(InMemoryAuditStore::new()));
//!     plane.send_command("status alice").await?;
//!     plane.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{
    Ack, ControlError, ControlPlane, FeedbackController, MonitorSettings, ProcessSupervisor,
    SecureLogTail, SupervisorError, SupervisorEvent, TailEvent,
};
pub use domain::models::{
    AlertLevel, AlertRecord, Classification, Config, DecisionStatus, GatekeeperLogRecord,
    ThrottleDirective, WorkerId, WorkerState,
};
pub use domain::ports::{AuditStore, InMemoryAuditStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AlertClassifier, KeywordClassifier};
