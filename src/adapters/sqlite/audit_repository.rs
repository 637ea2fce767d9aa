//! SQLite implementation of the AuditStore port.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AlertLevel, AlertRecord, DecisionStatus, GatekeeperLogRecord};
use crate::domain::ports::{AuditRecord, AuditStore, RecordKind};

#[derive(Clone)]
pub struct SqliteAuditStore {
    pool: SqlitePool,
}

impl SqliteAuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn now() -> (chrono::DateTime<Utc>, String) {
        let now = Utc::now();
        // Fixed-width text keeps ORDER BY timestamp chronological.
        (now, now.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append_alert(&self, level: AlertLevel, message: &str) -> DomainResult<AlertRecord> {
        let (timestamp, stamp) = Self::now();
        let result = sqlx::query("INSERT INTO alerts (timestamp, level, message) VALUES (?, ?, ?)")
            .bind(&stamp)
            .bind(level.as_str())
            .bind(message)
            .execute(&self.pool)
            .await?;

        Ok(AlertRecord {
            id: result.last_insert_rowid(),
            timestamp,
            level,
            message: message.to_string(),
        })
    }

    async fn append_gatekeeper_log(
        &self,
        user_id: &str,
        status: DecisionStatus,
        remaining: Option<i64>,
    ) -> DomainResult<GatekeeperLogRecord> {
        let (timestamp, stamp) = Self::now();
        let result = sqlx::query(
            "INSERT INTO gatekeeper_logs (timestamp, user_id, status, remaining) VALUES (?, ?, ?, ?)",
        )
        .bind(&stamp)
        .bind(user_id)
        .bind(status.as_str())
        .bind(remaining)
        .execute(&self.pool)
        .await?;

        Ok(GatekeeperLogRecord {
            id: result.last_insert_rowid(),
            timestamp,
            user_id: user_id.to_string(),
            status,
            remaining,
        })
    }

    async fn list_recent(&self, kind: RecordKind, limit: usize) -> DomainResult<Vec<AuditRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        match kind {
            RecordKind::Alert => {
                let rows: Vec<AlertRow> = sqlx::query_as(
                    "SELECT id, timestamp, level, message FROM alerts
                     ORDER BY timestamp DESC, id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

                rows.into_iter()
                    .map(|r| AlertRecord::try_from(r).map(AuditRecord::Alert))
                    .collect()
            }
            RecordKind::GatekeeperLog => {
                let rows: Vec<GatekeeperLogRow> = sqlx::query_as(
                    "SELECT id, timestamp, user_id, status, remaining FROM gatekeeper_logs
                     ORDER BY timestamp DESC, id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

                rows.into_iter()
                    .map(|r| GatekeeperLogRecord::try_from(r).map(AuditRecord::GatekeeperLog))
                    .collect()
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: i64,
    timestamp: String,
    level: String,
    message: String,
}

impl TryFrom<AlertRow> for AlertRecord {
    type Error = DomainError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let level = row
            .level
            .parse::<AlertLevel>()
            .map_err(DomainError::SerializationError)?;

        Ok(AlertRecord {
            id: row.id,
            timestamp: super::parse_datetime(&row.timestamp)?,
            level,
            message: row.message,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GatekeeperLogRow {
    id: i64,
    timestamp: String,
    user_id: String,
    status: String,
    remaining: Option<i64>,
}

impl TryFrom<GatekeeperLogRow> for GatekeeperLogRecord {
    type Error = DomainError;

    fn try_from(row: GatekeeperLogRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<DecisionStatus>()
            .map_err(DomainError::SerializationError)?;

        Ok(GatekeeperLogRecord {
            id: row.id,
            timestamp: super::parse_datetime(&row.timestamp)?,
            user_id: row.user_id,
            status,
            remaining: row.remaining,
        })
    }
}
