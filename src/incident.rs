//! Incident Log
//!
//! Append-only record of events an operator must see. Refund outcomes
//! always produce one: normal priority when the money came back on its
//! own, high priority when a human has to step in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::EngineError;
use crate::ledger::TransferId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentKind {
    /// Payout failed, refund succeeded. Informational.
    PayoutFailureRefunded,
    /// Payout failed and the refund did too. Money is stuck.
    RefundFailure,
}

impl IncidentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentKind::PayoutFailureRefunded => "payout_failure_refunded",
            IncidentKind::RefundFailure => "refund_failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentPriority {
    Normal,
    High,
}

impl IncidentPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentPriority::Normal => "normal",
            IncidentPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Incident {
    pub incident_id: ulid::Ulid,
    pub transfer_id: TransferId,
    pub kind: IncidentKind,
    pub priority: IncidentPriority,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

impl Incident {
    pub fn new(
        transfer_id: TransferId,
        kind: IncidentKind,
        priority: IncidentPriority,
        detail: Value,
    ) -> Self {
        Self {
            incident_id: ulid::Ulid::new(),
            transfer_id,
            kind,
            priority,
            detail,
            created_at: Utc::now(),
        }
    }
}

/// Append-only incident sink
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn record(&self, incident: &Incident) -> Result<(), EngineError>;
}

const INCIDENTS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS incidents_tb (
    id BIGSERIAL PRIMARY KEY,
    incident_id VARCHAR(26) NOT NULL UNIQUE,
    transfer_id VARCHAR(26) NOT NULL,
    kind VARCHAR(64) NOT NULL,
    priority VARCHAR(16) NOT NULL,
    detail JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_incidents_transfer ON incidents_tb (transfer_id);
CREATE INDEX IF NOT EXISTS idx_incidents_priority ON incidents_tb (priority, created_at)
"#;

pub async fn ensure_incident_schema(pool: &PgPool) -> Result<(), EngineError> {
    for statement in INCIDENTS_DDL.split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement).execute(pool).await?;
        }
    }
    Ok(())
}

pub struct PgIncidentStore {
    pool: PgPool,
}

impl PgIncidentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
    async fn record(&self, incident: &Incident) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO incidents_tb
                (incident_id, transfer_id, kind, priority, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(incident.incident_id.to_string())
        .bind(incident.transfer_id.to_string())
        .bind(incident.kind.as_str())
        .bind(incident.priority.as_str())
        .bind(&incident.detail)
        .bind(incident.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory incident sink for tests and mock-api deployments
#[cfg(any(test, feature = "mock-api"))]
pub mod memory {
    use super::*;
    use std::sync::Mutex;

    pub struct MemoryIncidentStore {
        incidents: Mutex<Vec<Incident>>,
        fail_writes: Mutex<bool>,
    }

    impl MemoryIncidentStore {
        pub fn new() -> Self {
            Self {
                incidents: Mutex::new(Vec::new()),
                fail_writes: Mutex::new(false),
            }
        }

        pub fn set_fail_writes(&self, fail: bool) {
            *self.fail_writes.lock().unwrap() = fail;
        }

        pub fn incidents(&self) -> Vec<Incident> {
            self.incidents.lock().unwrap().clone()
        }

        pub fn count(&self) -> usize {
            self.incidents.lock().unwrap().len()
        }
    }

    impl Default for MemoryIncidentStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl IncidentStore for MemoryIncidentStore {
        async fn record(&self, incident: &Incident) -> Result<(), EngineError> {
            if *self.fail_writes.lock().unwrap() {
                return Err(EngineError::Ledger("mock incident write failed".to_string()));
            }
            self.incidents.lock().unwrap().push(incident.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "mock-api"))]
pub use memory::MemoryIncidentStore;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_appends() {
        let store = MemoryIncidentStore::new();
        let transfer_id = TransferId::new();

        store
            .record(&Incident::new(
                transfer_id,
                IncidentKind::PayoutFailureRefunded,
                IncidentPriority::Normal,
                json!({"refund_ref": "rf_1"}),
            ))
            .await
            .unwrap();

        store
            .record(&Incident::new(
                transfer_id,
                IncidentKind::RefundFailure,
                IncidentPriority::High,
                json!({"error": "timeout"}),
            ))
            .await
            .unwrap();

        let incidents = store.incidents();
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].kind, IncidentKind::PayoutFailureRefunded);
        assert_eq!(incidents[1].priority, IncidentPriority::High);
        assert_eq!(incidents[1].transfer_id, transfer_id);
    }

    #[test]
    fn test_kind_and_priority_labels() {
        assert_eq!(
            IncidentKind::PayoutFailureRefunded.as_str(),
            "payout_failure_refunded"
        );
        assert_eq!(IncidentKind::RefundFailure.as_str(), "refund_failure");
        assert_eq!(IncidentPriority::High.as_str(), "high");
    }
}
