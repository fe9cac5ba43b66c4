//! Transfer Coordinator
//!
//! Drives a transfer from request to submitted payout. Everything that
//! can be checked without persisting runs first; the ledger only sees
//! requests that passed validation, KYC, and capture verification.
//! Once a payout submission is in flight there is no cancellation:
//! only the processor's verdict ends a `Processing` transfer.

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::compensation::CompensationHandler;
use crate::error::EngineError;
use crate::kyc::{KycGate, KycStatus};
use crate::ledger::{LedgerStore, TransferId, TransferRecord, TransferStatus};
use crate::money::{self, CurrencyLimits, MoneyError};
use crate::payment::{CaptureStatus, PaymentGateway};
use crate::payout::{PayoutOrder, PayoutOutcome, PayoutProcessor};
use crate::recipient::{PrefixTable, validate_recipient};

/// An inbound transfer request, amounts still in client string form.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub user_id: u64,
    pub amount: String,
    pub currency: String,
    pub recipient: String,
    pub payment_ref: String,
}

/// Corridor economics, fixed at startup.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub source_currency: String,
    pub source_scale: u32,
    pub payout_currency: String,
    /// Destination minor units per one major source unit
    pub fx_rate: Decimal,
    /// Service fee in basis points of the source amount
    pub fee_bps: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            source_currency: "NGN".to_string(),
            source_scale: 2,
            payout_currency: "KES".to_string(),
            // 0.085 KES per NGN
            fx_rate: Decimal::new(85, 3),
            fee_bps: 150,
        }
    }
}

pub struct TransferCoordinator {
    store: Arc<dyn LedgerStore>,
    payments: Arc<dyn PaymentGateway>,
    processor: Arc<dyn PayoutProcessor>,
    kyc: Arc<dyn KycGate>,
    compensator: Arc<CompensationHandler>,
    prefixes: PrefixTable,
    limits: CurrencyLimits,
    config: CoordinatorConfig,
}

impl TransferCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        payments: Arc<dyn PaymentGateway>,
        processor: Arc<dyn PayoutProcessor>,
        kyc: Arc<dyn KycGate>,
        compensator: Arc<CompensationHandler>,
        prefixes: PrefixTable,
        limits: CurrencyLimits,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            payments,
            processor,
            kyc,
            compensator,
            prefixes,
            limits,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Initiate a transfer.
    ///
    /// All validation and authorization runs before the first ledger
    /// write, so a rejected request leaves no trace. The returned record
    /// reflects the submission outcome: `Processing` with a payout ref
    /// on acceptance, `Failed` on business rejection, `Processing`
    /// without a ref when the submission timed out and the sweep worker
    /// will resubmit it.
    pub async fn initiate(&self, request: TransferRequest) -> Result<TransferRecord, EngineError> {
        if request.currency != self.config.source_currency {
            return Err(EngineError::UnsupportedCurrency(request.currency));
        }

        let source_minor = money::parse_amount(&request.amount, self.config.source_scale)?;
        let fee_minor = source_minor
            .checked_mul(self.config.fee_bps)
            .map(|v| v / 10_000)
            .ok_or(MoneyError::Overflow)?;
        let total_charged_minor = source_minor
            .checked_add(fee_minor)
            .ok_or(MoneyError::Overflow)?;

        let payout_minor = money::convert_to_payout_minor(
            source_minor,
            self.config.source_scale,
            self.config.fx_rate,
        )?;
        self.limits
            .validate_payout_amount(&self.config.payout_currency, payout_minor)?;

        let kyc_status = self.kyc.status(request.user_id).await?;
        if kyc_status != KycStatus::Approved {
            return Err(EngineError::KycRequired(format!(
                "user verification status is {}",
                kyc_status.as_str()
            )));
        }

        let capture = self.payments.verify_capture(&request.payment_ref).await?;
        if capture != CaptureStatus::Succeeded {
            return Err(EngineError::CaptureNotConfirmed {
                payment_ref: request.payment_ref,
                status: capture.as_str().to_string(),
            });
        }

        let recipient = validate_recipient(&request.recipient, &self.prefixes)?;
        if let Some(warning) = &recipient.warning {
            warn!(
                recipient = %recipient.local_number,
                network = %recipient.network,
                warning,
                "Recipient prefix accepted with warning"
            );
        }

        let mut record = TransferRecord::new(
            TransferId::new(),
            request.user_id,
            source_minor,
            fee_minor,
            total_charged_minor,
            self.config.source_currency.clone(),
            payout_minor,
            self.config.payout_currency.clone(),
            &recipient,
            request.payment_ref,
        );
        self.store.create(&record).await?;

        info!(
            transfer_id = %record.transfer_id,
            user_id = record.user_id,
            source_amount = record.source_amount_minor,
            fee = record.fee_minor,
            payout_amount = record.payout_amount_minor,
            network = %record.recipient_network,
            "Transfer created"
        );

        let moved = self
            .store
            .update_status_if(
                record.transfer_id,
                TransferStatus::Pending,
                TransferStatus::Processing,
                None,
                None,
            )
            .await?;
        if !moved {
            // Freshly created; only an admin cancel can interleave here
            warn!(
                transfer_id = %record.transfer_id,
                "Transfer moved by another writer before submission"
            );
            return self.reload(record.transfer_id).await;
        }
        record.status = TransferStatus::Processing;

        self.submit_payout(record).await
    }

    /// Re-submit a transfer stuck without a payout ref.
    ///
    /// Idempotent: the stored key means the processor either creates the
    /// payout now or returns the one it already has. Anything not in the
    /// stuck shape is returned untouched.
    pub async fn resume(&self, transfer_id: TransferId) -> Result<TransferRecord, EngineError> {
        let record = self.reload(transfer_id).await?;

        if record.status != TransferStatus::Processing || record.payout_ref.is_some() {
            debug!(
                transfer_id = %record.transfer_id,
                status = %record.status,
                has_payout_ref = record.payout_ref.is_some(),
                "Nothing to resume"
            );
            return Ok(record);
        }

        info!(
            transfer_id = %record.transfer_id,
            idempotency_key = %record.idempotency_key,
            "Resubmitting payout with stored idempotency key"
        );
        self.submit_payout(record).await
    }

    async fn submit_payout(&self, record: TransferRecord) -> Result<TransferRecord, EngineError> {
        let order = PayoutOrder {
            amount_minor: record.payout_amount_minor,
            currency: record.payout_currency.clone(),
            routing_code: record.routing_code.clone(),
            msisdn: record.msisdn(),
            idempotency_key: record.idempotency_key.clone(),
            metadata: json!({
                "transfer_id": record.transfer_id.to_string(),
                "payment_ref": record.payment_ref,
            }),
        };

        match self.processor.submit(&order).await {
            Ok(PayoutOutcome::Accepted { payout_ref, status }) => {
                info!(
                    transfer_id = %record.transfer_id,
                    payout_ref = %payout_ref,
                    processor_status = %status,
                    "Payout submission accepted"
                );
                self.store
                    .set_payout_ref(record.transfer_id, &payout_ref)
                    .await?;
                self.reload(record.transfer_id).await
            }
            Ok(PayoutOutcome::Rejected {
                code,
                reason,
                message,
                details,
            }) => {
                warn!(
                    transfer_id = %record.transfer_id,
                    code = %code,
                    reason = %reason,
                    message = %message,
                    %details,
                    "Payout submission rejected"
                );

                let failure = format!("{}: {}", code, reason);
                let moved = self
                    .store
                    .update_status_if(
                        record.transfer_id,
                        record.status,
                        TransferStatus::Failed,
                        Some(&failure),
                        None,
                    )
                    .await?;

                let failed = self.reload(record.transfer_id).await?;
                if moved {
                    self.compensator.handle_payout_failure(&failed).await?;
                    self.reload(record.transfer_id).await
                } else {
                    Ok(failed)
                }
            }
            Err(e) if e.is_transient() => {
                // The processor may have recorded the payout. Holding
                // Processing with no ref hands the record to the sweep
                // worker, which resubmits with the same key.
                warn!(
                    transfer_id = %record.transfer_id,
                    error = %e,
                    "Payout submission failed in transit, leaving transfer for resubmission"
                );
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    async fn reload(&self, transfer_id: TransferId) -> Result<TransferRecord, EngineError> {
        self.store
            .get(transfer_id)
            .await?
            .ok_or_else(|| EngineError::TransferNotFound(transfer_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::MemoryIncidentStore;
    use crate::ledger::{MemoryLedgerStore, PaymentSubState};
    use crate::payment::MockPaymentGateway;
    use crate::payout::MockPayoutProcessor;

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        payments: Arc<MockPaymentGateway>,
        processor: Arc<MockPayoutProcessor>,
        kyc: Arc<crate::kyc::StaticKycGate>,
        incidents: Arc<MemoryIncidentStore>,
        coordinator: TransferCoordinator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let payments = Arc::new(MockPaymentGateway::new());
        let processor = Arc::new(MockPayoutProcessor::new());
        let kyc = Arc::new(crate::kyc::StaticKycGate::new());
        let incidents = Arc::new(MemoryIncidentStore::new());
        let compensator = Arc::new(CompensationHandler::new(
            store.clone(),
            payments.clone(),
            incidents.clone(),
        ));
        let coordinator = TransferCoordinator::new(
            store.clone(),
            payments.clone(),
            processor.clone(),
            kyc.clone(),
            compensator,
            PrefixTable::kenya_defaults(),
            CurrencyLimits::kenya_defaults(),
            CoordinatorConfig::default(),
        );
        Fixture {
            store,
            payments,
            processor,
            kyc,
            incidents,
            coordinator,
        }
    }

    fn approved_request(f: &Fixture) -> TransferRequest {
        f.kyc.set_status(1001, KycStatus::Approved);
        f.payments
            .set_capture("pay_ok", CaptureStatus::Succeeded);
        TransferRequest {
            user_id: 1001,
            amount: "5000.00".to_string(),
            currency: "NGN".to_string(),
            recipient: "0712345678".to_string(),
            payment_ref: "pay_ok".to_string(),
        }
    }

    #[tokio::test]
    async fn test_happy_path_submits_payout() {
        let f = fixture();
        let record = f.coordinator.initiate(approved_request(&f)).await.unwrap();

        assert_eq!(record.status, TransferStatus::Processing);
        assert!(record.payout_ref.is_some());
        // 5000.00 NGN at 0.085 = 425 KES, fee 1.5% = 75.00 NGN
        assert_eq!(record.source_amount_minor, 500_000);
        assert_eq!(record.fee_minor, 7_500);
        assert_eq!(record.total_charged_minor, 507_500);
        assert_eq!(record.payout_amount_minor, 425);
        assert_eq!(record.recipient_network, "safaricom");
        assert_eq!(f.processor.distinct_key_count(), 1);
    }

    #[tokio::test]
    async fn test_unapproved_user_persists_nothing() {
        let f = fixture();
        let mut request = approved_request(&f);
        request.user_id = 2002;

        let err = f.coordinator.initiate(request).await.unwrap_err();
        assert!(matches!(err, EngineError::KycRequired(_)));
        assert_eq!(f.store.record_count(), 0);
        assert_eq!(f.processor.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfirmed_capture_persists_nothing() {
        let f = fixture();
        let mut request = approved_request(&f);
        f.payments.set_capture("pay_pending", CaptureStatus::Pending);
        request.payment_ref = "pay_pending".to_string();

        let err = f.coordinator.initiate(request).await.unwrap_err();
        assert!(matches!(err, EngineError::CaptureNotConfirmed { .. }));
        assert_eq!(f.store.record_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_recipient_persists_nothing() {
        let f = fixture();
        let mut request = approved_request(&f);
        request.recipient = "12345".to_string();

        let err = f.coordinator.initiate(request).await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecipient(_)));
        assert_eq!(f.store.record_count(), 0);
    }

    #[tokio::test]
    async fn test_payout_below_minimum_rejected() {
        let f = fixture();
        let mut request = approved_request(&f);
        // 100.00 NGN at 0.085 = 9 KES, below the KES 10 floor
        request.amount = "100.00".to_string();

        let err = f.coordinator.initiate(request).await.unwrap_err();
        assert!(matches!(err, EngineError::AmountTooSmall { .. }));
        assert_eq!(f.store.record_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_source_currency_rejected() {
        let f = fixture();
        let mut request = approved_request(&f);
        request.currency = "USD".to_string();

        let err = f.coordinator.initiate(request).await.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedCurrency(_)));
    }

    #[tokio::test]
    async fn test_rejection_fails_transfer_and_refunds() {
        let f = fixture();
        f.processor
            .set_reject_next("insufficient_float", "float balance too low");

        let record = f.coordinator.initiate(approved_request(&f)).await.unwrap();
        assert_eq!(record.status, TransferStatus::Failed);
        assert_eq!(
            record.failure_reason.as_deref(),
            Some("insufficient_float: float balance too low")
        );
        assert!(record.payout_ref.is_none());
        assert_eq!(record.refund_state, Some(PaymentSubState::Refunded));
        assert_eq!(f.payments.refund_count(), 1);
        assert_eq!(f.incidents.count(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_leaves_processing_for_resume() {
        let f = fixture();
        f.processor.set_network_failure(true);

        let record = f.coordinator.initiate(approved_request(&f)).await.unwrap();
        assert_eq!(record.status, TransferStatus::Processing);
        assert!(record.payout_ref.is_none());
        assert_eq!(f.payments.refund_count(), 0);

        // Sweep worker finds it and resumes; the stored key means one
        // payout at the processor
        f.processor.set_network_failure(false);
        let resumed = f.coordinator.resume(record.transfer_id).await.unwrap();
        assert_eq!(resumed.status, TransferStatus::Processing);
        assert!(resumed.payout_ref.is_some());
        assert_eq!(f.processor.distinct_key_count(), 1);
    }

    #[tokio::test]
    async fn test_resume_with_payout_ref_is_noop() {
        let f = fixture();
        let record = f.coordinator.initiate(approved_request(&f)).await.unwrap();
        let submits = f.processor.submit_count();

        let resumed = f.coordinator.resume(record.transfer_id).await.unwrap();
        assert_eq!(resumed.payout_ref, record.payout_ref);
        assert_eq!(f.processor.submit_count(), submits);
    }

    #[tokio::test]
    async fn test_resume_unknown_transfer_fails() {
        let f = fixture();
        let err = f.coordinator.resume(TransferId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::TransferNotFound(_)));
    }
}
