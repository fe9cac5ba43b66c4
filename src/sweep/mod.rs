//! Reconciliation Sweep
//!
//! Webhooks get lost. The sweep pages the processor's payout list,
//! joins it against local non-terminal transfers by payout ref, and
//! pushes every divergent status through the same guarded transition
//! the webhook path uses. Records are processed sequentially; the
//! processor rate-limits aggressively and the sweep is not latency
//! sensitive.

pub mod worker;

pub use worker::{SweepWorker, SweepWorkerConfig};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::compensation::CompensationHandler;
use crate::error::EngineError;
use crate::ledger::{LedgerStore, TransferStatus, transition};
use crate::payout::{PayoutProcessor, ProcessorPayout};

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Page size for the processor list endpoint
    pub page_limit: usize,
    /// Hard cap on pages per run
    pub max_pages: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            page_limit: 100,
            max_pages: 50,
        }
    }
}

/// Counters for one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Open local transfers considered
    pub examined: usize,
    /// Transitions that won their CAS
    pub applied: usize,
    /// Already in agreement, terminal, or lost a race
    pub unchanged: usize,
    /// Processor statuses outside the mapping table
    pub skipped_unmapped: usize,
    /// Per-record failures; never abort the batch
    pub errors: usize,
}

pub struct ReconciliationSweep {
    store: Arc<dyn LedgerStore>,
    processor: Arc<dyn PayoutProcessor>,
    compensator: Arc<CompensationHandler>,
    config: SweepConfig,
}

impl ReconciliationSweep {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        processor: Arc<dyn PayoutProcessor>,
        compensator: Arc<CompensationHandler>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            processor,
            compensator,
            config,
        }
    }

    /// One full reconciliation pass.
    pub async fn run(&self) -> Result<SweepSummary, EngineError> {
        let open = self.store.find_open_with_payout_ref().await?;
        if open.is_empty() {
            debug!("No open transfers with a payout ref, skipping sweep");
            return Ok(SweepSummary::default());
        }

        let reports = self.fetch_processor_reports().await?;

        let mut summary = SweepSummary {
            examined: open.len(),
            ..Default::default()
        };

        for record in &open {
            // payout_ref is non-NULL by query contract
            let Some(payout_ref) = record.payout_ref.as_deref() else {
                continue;
            };
            let Some(report) = reports.get(payout_ref) else {
                debug!(
                    transfer_id = %record.transfer_id,
                    payout_ref,
                    "Payout not in processor listing, leaving as-is"
                );
                summary.unchanged += 1;
                continue;
            };

            match transition::apply_processor_status(
                self.store.as_ref(),
                record,
                &report.status,
                report.failure_reason.as_deref(),
                report.settlement_ref.as_deref(),
            )
            .await
            {
                Ok(transition::Applied::Updated(new_status)) => {
                    summary.applied += 1;
                    if new_status == TransferStatus::Failed {
                        if let Err(e) = self.compensate(record.transfer_id).await {
                            warn!(
                                transfer_id = %record.transfer_id,
                                error = %e,
                                "Compensation failed during sweep"
                            );
                            summary.errors += 1;
                        }
                    }
                }
                Ok(transition::Applied::UnmappedStatus) => summary.skipped_unmapped += 1,
                Ok(_) => summary.unchanged += 1,
                Err(e) => {
                    warn!(
                        transfer_id = %record.transfer_id,
                        payout_ref,
                        error = %e,
                        "Sweep failed to apply processor status"
                    );
                    summary.errors += 1;
                }
            }
        }

        info!(
            examined = summary.examined,
            applied = summary.applied,
            unchanged = summary.unchanged,
            skipped_unmapped = summary.skipped_unmapped,
            errors = summary.errors,
            "Reconciliation sweep finished"
        );

        Ok(summary)
    }

    async fn fetch_processor_reports(
        &self,
    ) -> Result<HashMap<String, ProcessorPayout>, EngineError> {
        let mut reports = HashMap::new();

        for page in 0..self.config.max_pages {
            let offset = page * self.config.page_limit;
            let batch = self.processor.list(self.config.page_limit, offset).await?;
            let len = batch.len();

            for payout in batch {
                reports.insert(payout.payout_ref.clone(), payout);
            }

            if len < self.config.page_limit {
                break;
            }
        }

        Ok(reports)
    }

    async fn compensate(&self, transfer_id: crate::ledger::TransferId) -> Result<(), EngineError> {
        let record = self
            .store
            .get(transfer_id)
            .await?
            .ok_or_else(|| EngineError::TransferNotFound(transfer_id.to_string()))?;
        self.compensator.handle_payout_failure(&record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::MemoryIncidentStore;
    use crate::ledger::{MemoryLedgerStore, PaymentSubState, TransferId, TransferRecord};
    use crate::payment::MockPaymentGateway;
    use crate::payout::{MockPayoutProcessor, PayoutOrder, PayoutOutcome};
    use crate::recipient::{PrefixTable, validate_recipient};
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        processor: Arc<MockPayoutProcessor>,
        payments: Arc<MockPaymentGateway>,
        incidents: Arc<MemoryIncidentStore>,
        sweep: ReconciliationSweep,
    }

    fn fixture() -> Fixture {
        fixture_with_config(SweepConfig::default())
    }

    fn fixture_with_config(config: SweepConfig) -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let processor = Arc::new(MockPayoutProcessor::new());
        let payments = Arc::new(MockPaymentGateway::new());
        let incidents = Arc::new(MemoryIncidentStore::new());
        let compensator = Arc::new(CompensationHandler::new(
            store.clone(),
            payments.clone(),
            incidents.clone(),
        ));
        let sweep = ReconciliationSweep::new(
            store.clone(),
            processor.clone(),
            compensator,
            config,
        );
        Fixture {
            store,
            processor,
            payments,
            incidents,
            sweep,
        }
    }

    async fn submitted_record(f: &Fixture, payment_ref: &str) -> TransferRecord {
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
            payment_ref.to_string(),
        );
        record.status = TransferStatus::Processing;

        let outcome = f
            .processor
            .submit(&PayoutOrder {
                amount_minor: record.payout_amount_minor,
                currency: record.payout_currency.clone(),
                routing_code: record.routing_code.clone(),
                msisdn: record.msisdn(),
                idempotency_key: record.idempotency_key.clone(),
                metadata: json!({}),
            })
            .await
            .unwrap();
        let PayoutOutcome::Accepted { payout_ref, .. } = outcome else {
            panic!("expected acceptance");
        };
        record.payout_ref = Some(payout_ref);

        f.store.create(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_sweep_applies_completed_status() {
        let f = fixture();
        let record = submitted_record(&f, "pay_s1").await;
        let payout_ref = record.payout_ref.clone().unwrap();
        f.processor
            .set_payout_status(&payout_ref, "completed", None, Some("batch_9"));

        let summary = f.sweep.run().await.unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.errors, 0);

        let stored = f.store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
        assert_eq!(stored.settlement_ref.as_deref(), Some("batch_9"));
    }

    #[tokio::test]
    async fn test_sweep_failed_routes_through_compensation() {
        let f = fixture();
        let record = submitted_record(&f, "pay_s2").await;
        let payout_ref = record.payout_ref.clone().unwrap();
        f.processor
            .set_payout_status(&payout_ref, "failed", Some("invalid_destination"), None);

        let summary = f.sweep.run().await.unwrap();
        assert_eq!(summary.applied, 1);

        let stored = f.store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Failed);
        assert_eq!(stored.refund_state, Some(PaymentSubState::Refunded));
        assert_eq!(f.payments.refund_count(), 1);
        assert_eq!(f.incidents.count(), 1);
    }

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let f = fixture();
        let record = submitted_record(&f, "pay_s3").await;
        let payout_ref = record.payout_ref.clone().unwrap();
        f.processor
            .set_payout_status(&payout_ref, "completed", None, None);

        f.sweep.run().await.unwrap();
        let writes = f.store.write_count();

        // Completed transfers leave the open set, so the second run
        // examines nothing
        let summary = f.sweep.run().await.unwrap();
        assert_eq!(summary, SweepSummary::default());
        assert_eq!(f.store.write_count(), writes);

        let stored = f.store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
    }

    #[tokio::test]
    async fn test_unmapped_status_counted_not_applied() {
        let f = fixture();
        let record = submitted_record(&f, "pay_s4").await;
        let payout_ref = record.payout_ref.clone().unwrap();
        f.processor
            .set_payout_status(&payout_ref, "reversed", None, None);

        let summary = f.sweep.run().await.unwrap();
        assert_eq!(summary.skipped_unmapped, 1);
        assert_eq!(summary.applied, 0);

        let stored = f.store.get(record.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Processing);
    }

    #[tokio::test]
    async fn test_missing_from_listing_left_alone() {
        let f = fixture();
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
            "pay_s5".to_string(),
        );
        record.status = TransferStatus::Processing;
        // A ref the processor never listed
        record.payout_ref = Some("po_unlisted".to_string());
        f.store.create(&record).await.unwrap();

        let summary = f.sweep.run().await.unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.applied, 0);
    }

    #[tokio::test]
    async fn test_sweep_pages_through_listing() {
        let f = fixture_with_config(SweepConfig {
            page_limit: 2,
            max_pages: 10,
        });

        let mut records = Vec::new();
        for i in 0..5 {
            records.push(submitted_record(&f, &format!("pay_pg{}", i)).await);
        }
        for record in &records {
            let payout_ref = record.payout_ref.clone().unwrap();
            f.processor
                .set_payout_status(&payout_ref, "completed", None, None);
        }

        let summary = f.sweep.run().await.unwrap();
        assert_eq!(summary.examined, 5);
        assert_eq!(summary.applied, 5);
    }

    #[tokio::test]
    async fn test_one_bad_record_does_not_stop_the_batch() {
        let f = fixture();
        let broken = submitted_record(&f, "pay_b1").await;
        let healthy = submitted_record(&f, "pay_b2").await;
        for record in [&broken, &healthy] {
            let payout_ref = record.payout_ref.clone().unwrap();
            f.processor
                .set_payout_status(&payout_ref, "completed", None, None);
        }
        f.store.break_updates_for(broken.transfer_id);

        let summary = f.sweep.run().await.unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.applied, 1);

        let stored = f.store.get(healthy.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
        let stored = f.store.get(broken.transfer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Processing);
    }

    #[tokio::test]
    async fn test_processor_outage_aborts_run_without_writes() {
        let f = fixture();
        submitted_record(&f, "pay_s6").await;
        let writes = f.store.write_count();
        f.processor.set_network_failure(true);

        assert!(f.sweep.run().await.is_err());
        assert_eq!(f.store.write_count(), writes);
    }
}
