//! Port trait definitions (Hexagonal Architecture)
//!
//! - AuditStore: durable append/list of alert and limiter-decision records
//! - InMemoryAuditStore: process-local implementation for tests and ephemeral runs

pub mod audit_store;
pub mod in_memory_audit_store;

pub use audit_store::{AuditRecord, AuditStore, RecordKind, DEFAULT_LIST_LIMIT};
pub use in_memory_audit_store::InMemoryAuditStore;
