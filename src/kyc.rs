//! KYC Gate
//!
//! Read-only check consulted before any money moves. Only `Approved`
//! users may initiate a transfer; everything else fails fast with no
//! record persisted.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KycStatus {
    Approved,
    Pending,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Approved => "approved",
            KycStatus::Pending => "pending",
            KycStatus::Rejected => "rejected",
        }
    }
}

/// KYC status lookup
#[async_trait]
pub trait KycGate: Send + Sync {
    async fn status(&self, user_id: u64) -> Result<KycStatus, EngineError>;
}

/// Reads the verification state maintained by the onboarding system.
/// Users without a row have never completed onboarding and count as
/// `Pending`.
pub struct PgKycGate {
    pool: PgPool,
}

impl PgKycGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KycGate for PgKycGate {
    async fn status(&self, user_id: u64) -> Result<KycStatus, EngineError> {
        let row = sqlx::query("SELECT kyc_status FROM users_tb WHERE user_id = $1")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(KycStatus::Pending);
        };

        let status: String = row.get("kyc_status");
        match status.as_str() {
            "approved" => Ok(KycStatus::Approved),
            "rejected" => Ok(KycStatus::Rejected),
            _ => Ok(KycStatus::Pending),
        }
    }
}

/// Fixed-table gate for tests and mock-api deployments
#[cfg(any(test, feature = "mock-api"))]
pub mod r#static {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub struct StaticKycGate {
        /// Unlisted users are `Pending`
        statuses: Mutex<HashMap<u64, KycStatus>>,
        default: KycStatus,
    }

    impl StaticKycGate {
        pub fn new() -> Self {
            Self {
                statuses: Mutex::new(HashMap::new()),
                default: KycStatus::Pending,
            }
        }

        /// Gate that approves everyone, for mock-api deployments.
        pub fn approve_all() -> Self {
            Self {
                statuses: Mutex::new(HashMap::new()),
                default: KycStatus::Approved,
            }
        }

        pub fn set_status(&self, user_id: u64, status: KycStatus) {
            self.statuses.lock().unwrap().insert(user_id, status);
        }
    }

    impl Default for StaticKycGate {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl KycGate for StaticKycGate {
        async fn status(&self, user_id: u64) -> Result<KycStatus, EngineError> {
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .get(&user_id)
                .copied()
                .unwrap_or(self.default))
        }
    }
}

#[cfg(any(test, feature = "mock-api"))]
pub use r#static::StaticKycGate;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_gate_defaults_pending() {
        let gate = StaticKycGate::new();
        assert_eq!(gate.status(42).await.unwrap(), KycStatus::Pending);

        gate.set_status(42, KycStatus::Approved);
        gate.set_status(43, KycStatus::Rejected);
        assert_eq!(gate.status(42).await.unwrap(), KycStatus::Approved);
        assert_eq!(gate.status(43).await.unwrap(), KycStatus::Rejected);
    }

    #[tokio::test]
    async fn test_approve_all_gate() {
        let gate = StaticKycGate::approve_all();
        assert_eq!(gate.status(1).await.unwrap(), KycStatus::Approved);

        gate.set_status(2, KycStatus::Rejected);
        assert_eq!(gate.status(2).await.unwrap(), KycStatus::Rejected);
    }
}
