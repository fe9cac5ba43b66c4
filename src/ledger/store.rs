//! Ledger Store Seam
//!
//! All state updates are atomic CAS (Compare-And-Swap) operations: an
//! `UPDATE ... WHERE status = expected` that reports whether it won.
//! Concurrent writers (webhook, sweep, coordinator) never read-modify-write.

use async_trait::async_trait;
use std::time::Duration;

use super::state::{PaymentSubState, TransferStatus};
use super::types::{TransferId, TransferRecord};
use crate::error::EngineError;

/// Persistence operations for the transfer ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new transfer record
    async fn create(&self, record: &TransferRecord) -> Result<(), EngineError>;

    async fn get(&self, id: TransferId) -> Result<Option<TransferRecord>, EngineError>;

    /// Look up by the payout processor's reference (webhook/sweep join key)
    async fn get_by_payout_ref(
        &self,
        payout_ref: &str,
    ) -> Result<Option<TransferRecord>, EngineError>;

    /// Atomic CAS update: move to `new` only if the row still holds
    /// `expected`. Returns true if this writer won the transition.
    async fn update_status_if(
        &self,
        id: TransferId,
        expected: TransferStatus,
        new: TransferStatus,
        failure_reason: Option<&str>,
        settlement_ref: Option<&str>,
    ) -> Result<bool, EngineError>;

    /// Record the processor's payout reference after an accepted submission
    async fn set_payout_ref(&self, id: TransferId, payout_ref: &str) -> Result<(), EngineError>;

    /// Claim the refund for this transfer. CAS on `refund_state IS NULL`;
    /// returns true for exactly one caller, ever.
    async fn begin_refund(&self, id: TransferId) -> Result<bool, EngineError>;

    /// Record the refund outcome claimed via [`begin_refund`]
    async fn finish_refund(
        &self,
        id: TransferId,
        state: PaymentSubState,
        refund_ref: Option<&str>,
        requires_manual_intervention: bool,
    ) -> Result<(), EngineError>;

    /// Non-terminal transfers that have a payout reference (sweep input)
    async fn find_open_with_payout_ref(&self) -> Result<Vec<TransferRecord>, EngineError>;

    /// PROCESSING transfers with no payout reference that have not been
    /// touched within `threshold`. A submission timeout leaves exactly
    /// this shape behind; the sweep worker resubmits them.
    async fn find_stale_submissions(
        &self,
        threshold: Duration,
    ) -> Result<Vec<TransferRecord>, EngineError>;
}

/// In-memory store for tests and mock-api deployments
#[cfg(any(test, feature = "mock-api"))]
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MemoryLedgerStore {
        records: Mutex<HashMap<TransferId, TransferRecord>>,
        /// Count of status writes that actually changed a row
        write_count: AtomicUsize,
        /// Transfers whose status updates fail with a storage error
        broken_updates: Mutex<HashSet<TransferId>>,
    }

    impl MemoryLedgerStore {
        pub fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                write_count: AtomicUsize::new(0),
                broken_updates: Mutex::new(HashSet::new()),
            }
        }

        /// Number of winning status/refund writes so far. Lets tests
        /// assert that a repeated sweep produced zero new writes.
        pub fn write_count(&self) -> usize {
            self.write_count.load(Ordering::SeqCst)
        }

        /// Number of records held
        pub fn record_count(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        /// Make status updates for one transfer fail with a storage
        /// error (sweep error-isolation tests)
        pub fn break_updates_for(&self, id: TransferId) {
            self.broken_updates.lock().unwrap().insert(id);
        }

        /// Backdate a record's updated_at (stale-submission tests)
        pub fn age_record(&self, id: TransferId, by: Duration) {
            let mut records = self.records.lock().unwrap();
            if let Some(r) = records.get_mut(&id) {
                r.updated_at = chrono::Utc::now()
                    - chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
            }
        }
    }

    impl Default for MemoryLedgerStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LedgerStore for MemoryLedgerStore {
        async fn create(&self, record: &TransferRecord) -> Result<(), EngineError> {
            let mut records = self.records.lock().unwrap();
            if records.contains_key(&record.transfer_id) {
                return Err(EngineError::Ledger(format!(
                    "duplicate transfer_id: {}",
                    record.transfer_id
                )));
            }
            records.insert(record.transfer_id, record.clone());
            Ok(())
        }

        async fn get(&self, id: TransferId) -> Result<Option<TransferRecord>, EngineError> {
            Ok(self.records.lock().unwrap().get(&id).cloned())
        }

        async fn get_by_payout_ref(
            &self,
            payout_ref: &str,
        ) -> Result<Option<TransferRecord>, EngineError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .values()
                .find(|r| r.payout_ref.as_deref() == Some(payout_ref))
                .cloned())
        }

        async fn update_status_if(
            &self,
            id: TransferId,
            expected: TransferStatus,
            new: TransferStatus,
            failure_reason: Option<&str>,
            settlement_ref: Option<&str>,
        ) -> Result<bool, EngineError> {
            if self.broken_updates.lock().unwrap().contains(&id) {
                return Err(EngineError::Ledger(format!(
                    "injected update failure for {}",
                    id
                )));
            }
            let mut records = self.records.lock().unwrap();
            let Some(record) = records.get_mut(&id) else {
                return Ok(false);
            };
            if record.status != expected {
                return Ok(false);
            }
            record.status = new;
            if let Some(reason) = failure_reason {
                record.failure_reason = Some(reason.to_string());
            }
            if let Some(sref) = settlement_ref {
                record.settlement_ref = Some(sref.to_string());
            }
            record.updated_at = chrono::Utc::now();
            self.write_count.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn set_payout_ref(
            &self,
            id: TransferId,
            payout_ref: &str,
        ) -> Result<(), EngineError> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(&id)
                .ok_or_else(|| EngineError::TransferNotFound(id.to_string()))?;
            record.payout_ref = Some(payout_ref.to_string());
            record.updated_at = chrono::Utc::now();
            Ok(())
        }

        async fn begin_refund(&self, id: TransferId) -> Result<bool, EngineError> {
            let mut records = self.records.lock().unwrap();
            let Some(record) = records.get_mut(&id) else {
                return Ok(false);
            };
            if record.refund_state.is_some() {
                return Ok(false);
            }
            // Claim marker: RefundFailed until finish_refund overwrites it,
            // so a crash mid-refund lands on the manual-review side.
            record.refund_state = Some(PaymentSubState::RefundFailed);
            record.updated_at = chrono::Utc::now();
            self.write_count.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn finish_refund(
            &self,
            id: TransferId,
            state: PaymentSubState,
            refund_ref: Option<&str>,
            requires_manual_intervention: bool,
        ) -> Result<(), EngineError> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(&id)
                .ok_or_else(|| EngineError::TransferNotFound(id.to_string()))?;
            record.refund_state = Some(state);
            record.refund_ref = refund_ref.map(|s| s.to_string());
            record.requires_manual_intervention = requires_manual_intervention;
            record.updated_at = chrono::Utc::now();
            self.write_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn find_open_with_payout_ref(&self) -> Result<Vec<TransferRecord>, EngineError> {
            let records = self.records.lock().unwrap();
            let mut open: Vec<TransferRecord> = records
                .values()
                .filter(|r| !r.status.is_terminal() && r.payout_ref.is_some())
                .cloned()
                .collect();
            open.sort_by_key(|r| r.created_at);
            Ok(open)
        }

        async fn find_stale_submissions(
            &self,
            threshold: Duration,
        ) -> Result<Vec<TransferRecord>, EngineError> {
            let cutoff = chrono::Utc::now()
                - chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::zero());
            let records = self.records.lock().unwrap();
            let mut stale: Vec<TransferRecord> = records
                .values()
                .filter(|r| {
                    r.status == TransferStatus::Processing
                        && r.payout_ref.is_none()
                        && r.updated_at < cutoff
                })
                .cloned()
                .collect();
            stale.sort_by_key(|r| r.updated_at);
            Ok(stale)
        }
    }
}

#[cfg(any(test, feature = "mock-api"))]
pub use memory::MemoryLedgerStore;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipient::{PrefixTable, validate_recipient};

    fn sample_record() -> TransferRecord {
        let recipient =
            validate_recipient("0712345678", &PrefixTable::kenya_defaults()).unwrap();
        TransferRecord::new(
            TransferId::new(),
            1001,
            1_500_000,
            15_000,
            1_515_000,
            "NGN".to_string(),
            1265,
            "KES".to_string(),
            &recipient,
            "pay_abc123".to_string(),
        )
    }

    #[tokio::test]
    async fn test_cas_wins_once() {
        let store = MemoryLedgerStore::new();
        let record = sample_record();
        let id = record.transfer_id;
        store.create(&record).await.unwrap();

        let won = store
            .update_status_if(id, TransferStatus::Pending, TransferStatus::Processing, None, None)
            .await
            .unwrap();
        assert!(won);

        // Second writer expecting PENDING loses
        let won = store
            .update_status_if(id, TransferStatus::Pending, TransferStatus::Processing, None, None)
            .await
            .unwrap();
        assert!(!won);

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Processing);
    }

    #[tokio::test]
    async fn test_begin_refund_claims_exactly_once() {
        let store = MemoryLedgerStore::new();
        let record = sample_record();
        let id = record.transfer_id;
        store.create(&record).await.unwrap();

        assert!(store.begin_refund(id).await.unwrap());
        assert!(!store.begin_refund(id).await.unwrap());

        store
            .finish_refund(id, PaymentSubState::Refunded, Some("rf_1"), false)
            .await
            .unwrap();

        // Still claimed after the outcome lands
        assert!(!store.begin_refund(id).await.unwrap());

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.refund_state, Some(PaymentSubState::Refunded));
        assert_eq!(stored.refund_ref.as_deref(), Some("rf_1"));
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemoryLedgerStore::new();
        let record = sample_record();
        store.create(&record).await.unwrap();
        assert!(store.create(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_open_and_stale_scans() {
        let store = MemoryLedgerStore::new();

        let mut submitted = sample_record();
        submitted.status = TransferStatus::Processing;
        submitted.payout_ref = Some("po_1".to_string());
        store.create(&submitted).await.unwrap();

        let mut unsubmitted = sample_record();
        unsubmitted.status = TransferStatus::Processing;
        store.create(&unsubmitted).await.unwrap();

        let mut done = sample_record();
        done.status = TransferStatus::Completed;
        done.payout_ref = Some("po_2".to_string());
        store.create(&done).await.unwrap();

        let open = store.find_open_with_payout_ref().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].transfer_id, submitted.transfer_id);

        // Nothing stale yet
        let stale = store
            .find_stale_submissions(Duration::from_secs(60))
            .await
            .unwrap();
        assert!(stale.is_empty());

        store.age_record(unsubmitted.transfer_id, Duration::from_secs(120));
        let stale = store
            .find_stale_submissions(Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].transfer_id, unsubmitted.transfer_id);
    }
}
