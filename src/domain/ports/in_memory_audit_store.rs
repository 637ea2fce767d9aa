//! In-memory audit store.
//!
//! Used by tests and by `run --ephemeral`, where nothing should touch disk.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;

use super::{AuditRecord, AuditStore, RecordKind};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AlertLevel, AlertRecord, DecisionStatus, GatekeeperLogRecord};

#[derive(Debug, Default)]
struct Tables {
    alerts: Vec<AlertRecord>,
    gatekeeper_logs: Vec<GatekeeperLogRecord>,
}

/// Audit store that keeps every record in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    tables: Mutex<Tables>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DomainResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| DomainError::DatabaseError(format!("audit store mutex poisoned: {e}")))
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append_alert(&self, level: AlertLevel, message: &str) -> DomainResult<AlertRecord> {
        let mut tables = self.lock()?;
        let record = AlertRecord {
            id: i64::try_from(tables.alerts.len()).unwrap_or(i64::MAX) + 1,
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
        };
        tables.alerts.push(record.clone());
        Ok(record)
    }

    async fn append_gatekeeper_log(
        &self,
        user_id: &str,
        status: DecisionStatus,
        remaining: Option<i64>,
    ) -> DomainResult<GatekeeperLogRecord> {
        let mut tables = self.lock()?;
        let record = GatekeeperLogRecord {
            id: i64::try_from(tables.gatekeeper_logs.len()).unwrap_or(i64::MAX) + 1,
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            status,
            remaining,
        };
        tables.gatekeeper_logs.push(record.clone());
        Ok(record)
    }

    async fn list_recent(&self, kind: RecordKind, limit: usize) -> DomainResult<Vec<AuditRecord>> {
        let tables = self.lock()?;
        let records = match kind {
            RecordKind::Alert => tables
                .alerts
                .iter()
                .rev()
                .take(limit)
                .cloned()
                .map(AuditRecord::Alert)
                .collect(),
            RecordKind::GatekeeperLog => tables
                .gatekeeper_logs
                .iter()
                .rev()
                .take(limit)
                .cloned()
                .map(AuditRecord::GatekeeperLog)
                .collect(),
        };
        Ok(records)
    }
}
