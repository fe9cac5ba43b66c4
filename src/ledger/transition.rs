//! Guarded Processor-Status Transitions
//!
//! The one code path through which a processor-reported status may move a
//! transfer. Both the webhook ingestor and the reconciliation sweep call
//! [`apply_processor_status`]; neither writes statuses on its own.

use tracing::{debug, warn};

use super::state::TransferStatus;
use super::store::LedgerStore;
use super::types::TransferRecord;
use crate::error::EngineError;

/// What a transition attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The CAS won and the transfer now holds the new status
    Updated(TransferStatus),
    /// Mapped status equals the current one; nothing written
    Unchanged,
    /// Current status is terminal; the report was dropped
    AlreadyTerminal,
    /// Processor status not in the mapping table; held as-is
    UnmappedStatus,
    /// Another writer moved the transfer first; nothing written
    Raced,
}

/// Map a processor-reported status to a local transfer status.
///
/// Unrecognized statuses map to `None`: the transfer holds its current
/// state rather than guessing a terminal one.
pub fn map_processor_status(status: &str) -> Option<TransferStatus> {
    match status {
        "completed" => Some(TransferStatus::Completed),
        "failed" | "cancelled" => Some(TransferStatus::Failed),
        "pending" | "processing" => Some(TransferStatus::Processing),
        _ => None,
    }
}

/// Apply a processor-reported status to a transfer.
///
/// Terminal states are never overwritten, not even with a different
/// terminal value. The CAS is keyed on the status the caller observed,
/// so two writers applying reports concurrently cannot double-write.
pub async fn apply_processor_status(
    store: &dyn LedgerStore,
    record: &TransferRecord,
    processor_status: &str,
    failure_reason: Option<&str>,
    settlement_ref: Option<&str>,
) -> Result<Applied, EngineError> {
    let Some(new_status) = map_processor_status(processor_status) else {
        warn!(
            transfer_id = %record.transfer_id,
            processor_status,
            "Unrecognized processor status, holding current state"
        );
        return Ok(Applied::UnmappedStatus);
    };

    if record.status.is_terminal() {
        debug!(
            transfer_id = %record.transfer_id,
            current = %record.status,
            reported = %new_status,
            "Transfer already terminal, dropping report"
        );
        return Ok(Applied::AlreadyTerminal);
    }

    if new_status == record.status {
        return Ok(Applied::Unchanged);
    }

    let reason = if new_status == TransferStatus::Failed {
        Some(failure_reason.unwrap_or("payout failed at processor"))
    } else {
        None
    };

    let won = store
        .update_status_if(
            record.transfer_id,
            record.status,
            new_status,
            reason,
            settlement_ref,
        )
        .await?;

    if !won {
        debug!(
            transfer_id = %record.transfer_id,
            expected = %record.status,
            "Lost transition race, another writer moved the transfer"
        );
        return Ok(Applied::Raced);
    }

    debug!(
        transfer_id = %record.transfer_id,
        old_status = %record.status,
        new_status = %new_status,
        "Transfer status advanced"
    );

    Ok(Applied::Updated(new_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::store::MemoryLedgerStore;
    use crate::ledger::types::TransferId;
    use crate::recipient::{PrefixTable, validate_recipient};

    fn processing_record() -> TransferRecord {
        let recipient =
            validate_recipient("0712345678", &PrefixTable::kenya_defaults()).unwrap();
        let mut record = TransferRecord::new(
            TransferId::new(),
            1001,
            1_500_000,
            15_000,
            1_515_000,
            "NGN".to_string(),
            1265,
            "KES".to_string(),
            &recipient,
            "pay_abc".to_string(),
        );
        record.status = TransferStatus::Processing;
        record.payout_ref = Some("po_1".to_string());
        record
    }

    #[test]
    fn test_status_mapping_table() {
        assert_eq!(
            map_processor_status("completed"),
            Some(TransferStatus::Completed)
        );
        assert_eq!(map_processor_status("failed"), Some(TransferStatus::Failed));
        assert_eq!(
            map_processor_status("cancelled"),
            Some(TransferStatus::Failed)
        );
        assert_eq!(
            map_processor_status("pending"),
            Some(TransferStatus::Processing)
        );
        assert_eq!(
            map_processor_status("processing"),
            Some(TransferStatus::Processing)
        );
        assert_eq!(map_processor_status("reversed"), None);
        assert_eq!(map_processor_status(""), None);
    }

    #[tokio::test]
    async fn test_completed_applies_once() {
        let store = MemoryLedgerStore::new();
        let record = processing_record();
        store.create(&record).await.unwrap();

        let applied =
            apply_processor_status(&store, &record, "completed", None, Some("batch_7"))
                .await
                .unwrap();
        assert_eq!(applied, Applied::Updated(TransferStatus::Completed));

        let stored = store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
        assert_eq!(stored.settlement_ref.as_deref(), Some("batch_7"));
    }

    #[tokio::test]
    async fn test_terminal_never_reentered() {
        let store = MemoryLedgerStore::new();
        let mut record = processing_record();
        record.status = TransferStatus::Completed;
        store.create(&record).await.unwrap();

        // A late "failed" report must not flip a completed transfer
        let applied = apply_processor_status(&store, &record, "failed", Some("late"), None)
            .await
            .unwrap();
        assert_eq!(applied, Applied::AlreadyTerminal);

        // Neither may a stale "processing" report
        let applied = apply_processor_status(&store, &record, "processing", None, None)
            .await
            .unwrap();
        assert_eq!(applied, Applied::AlreadyTerminal);

        let stored = store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
        assert!(stored.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_unchanged_writes_nothing() {
        let store = MemoryLedgerStore::new();
        let record = processing_record();
        store.create(&record).await.unwrap();

        let applied = apply_processor_status(&store, &record, "processing", None, None)
            .await
            .unwrap();
        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unmapped_status_holds_state() {
        let store = MemoryLedgerStore::new();
        let record = processing_record();
        store.create(&record).await.unwrap();

        let applied = apply_processor_status(&store, &record, "reversed", None, None)
            .await
            .unwrap();
        assert_eq!(applied, Applied::UnmappedStatus);

        let stored = store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Processing);
    }

    #[tokio::test]
    async fn test_stale_snapshot_loses_race() {
        let store = MemoryLedgerStore::new();
        let record = processing_record();
        store.create(&record).await.unwrap();

        // Webhook wins first
        apply_processor_status(&store, &record, "completed", None, None)
            .await
            .unwrap();

        // Sweep still holds the PROCESSING snapshot and tries "failed"
        let applied = apply_processor_status(&store, &record, "failed", Some("x"), None)
            .await
            .unwrap();
        assert_eq!(applied, Applied::Raced);

        let stored = store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_gets_default_reason() {
        let store = MemoryLedgerStore::new();
        let record = processing_record();
        store.create(&record).await.unwrap();

        apply_processor_status(&store, &record, "failed", None, None)
            .await
            .unwrap();

        let stored = store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Failed);
        assert!(stored.failure_reason.is_some());
    }
}
