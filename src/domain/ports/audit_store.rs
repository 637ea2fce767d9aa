use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AlertLevel, AlertRecord, DecisionStatus, GatekeeperLogRecord,
};

/// Number of records returned when the caller does not say.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Which audit table a listing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Alert,
    GatekeeperLog,
}

/// One row from either audit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Alert(AlertRecord),
    GatekeeperLog(GatekeeperLogRecord),
}

/// Append-only audit trail of monitor alerts and limiter decisions.
///
/// Records are immutable once appended. Listings are newest-first.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist an alert raised from the monitor log.
    async fn append_alert(&self, level: AlertLevel, message: &str) -> DomainResult<AlertRecord>;

    /// Persist a decision parsed from limiter output.
    async fn append_gatekeeper_log(
        &self,
        user_id: &str,
        status: DecisionStatus,
        remaining: Option<i64>,
    ) -> DomainResult<GatekeeperLogRecord>;

    /// Most recent records of one kind, newest first.
    async fn list_recent(&self, kind: RecordKind, limit: usize) -> DomainResult<Vec<AuditRecord>>;

    async fn recent_alerts(&self, limit: usize) -> DomainResult<Vec<AlertRecord>> {
        let records = self.list_recent(RecordKind::Alert, limit).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r {
                AuditRecord::Alert(a) => Some(a),
                AuditRecord::GatekeeperLog(_) => None,
            })
            .collect())
    }

    async fn recent_gatekeeper_logs(&self, limit: usize) -> DomainResult<Vec<GatekeeperLogRecord>> {
        let records = self.list_recent(RecordKind::GatekeeperLog, limit).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r {
                AuditRecord::GatekeeperLog(g) => Some(g),
                AuditRecord::Alert(_) => None,
            })
            .collect())
    }
}
