//! Compensation Handler
//!
//! When a payout fails after the card capture succeeded, the customer
//! has paid for nothing. This module refunds the capture, exactly once,
//! and leaves an incident either way. The `begin_refund` CAS is the
//! exactly-once guard: whichever caller wins it owns the refund; every
//! other caller sees `false` and walks away.

use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::incident::{Incident, IncidentKind, IncidentPriority, IncidentStore};
use crate::ledger::{LedgerStore, PaymentSubState, TransferRecord};
use crate::payment::{PaymentGateway, RefundStatus};

pub struct CompensationHandler {
    store: Arc<dyn LedgerStore>,
    payments: Arc<dyn PaymentGateway>,
    incidents: Arc<dyn IncidentStore>,
}

/// What a compensation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationResult {
    /// This call issued the refund and it succeeded
    Refunded,
    /// This call issued the refund and it failed; flagged for a human
    RefundFailed,
    /// Another caller already owns the refund; nothing done
    AlreadyHandled,
}

impl CompensationHandler {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        payments: Arc<dyn PaymentGateway>,
        incidents: Arc<dyn IncidentStore>,
    ) -> Self {
        Self {
            store,
            payments,
            incidents,
        }
    }

    /// Refund a failed payout's capture.
    ///
    /// Idempotent across webhook and sweep callers: the first to win the
    /// `begin_refund` CAS performs the refund, the rest get
    /// `AlreadyHandled`. The refund amount is everything the customer
    /// was charged, fee included.
    pub async fn handle_payout_failure(
        &self,
        record: &TransferRecord,
    ) -> Result<CompensationResult, EngineError> {
        if !self.store.begin_refund(record.transfer_id).await? {
            info!(
                transfer_id = %record.transfer_id,
                "Refund already claimed by another caller"
            );
            return Ok(CompensationResult::AlreadyHandled);
        }

        info!(
            transfer_id = %record.transfer_id,
            payment_ref = %record.payment_ref,
            amount_minor = record.total_charged_minor,
            gateway = self.payments.name(),
            "Issuing refund for failed payout"
        );

        let refund = self
            .payments
            .issue_refund(&record.payment_ref, record.total_charged_minor)
            .await;

        match refund {
            Ok(outcome) if outcome.status == RefundStatus::Succeeded => {
                self.store
                    .finish_refund(
                        record.transfer_id,
                        PaymentSubState::Refunded,
                        outcome.refund_ref.as_deref(),
                        false,
                    )
                    .await?;

                self.record_incident(
                    record,
                    IncidentKind::PayoutFailureRefunded,
                    IncidentPriority::Normal,
                    json!({
                        "payment_ref": record.payment_ref,
                        "refund_ref": outcome.refund_ref,
                        "amount_minor": record.total_charged_minor,
                        "failure_reason": record.failure_reason,
                    }),
                )
                .await;

                info!(
                    transfer_id = %record.transfer_id,
                    refund_ref = ?outcome.refund_ref,
                    "Refund succeeded"
                );
                Ok(CompensationResult::Refunded)
            }
            Ok(_) => {
                self.mark_refund_failed(record, "refund declined by payment processor")
                    .await?;
                Ok(CompensationResult::RefundFailed)
            }
            Err(e) => {
                // The claim marker is already RefundFailed, so even a
                // crash right here lands on the manual-review side.
                self.mark_refund_failed(record, &e.to_string()).await?;
                Ok(CompensationResult::RefundFailed)
            }
        }
    }

    async fn mark_refund_failed(
        &self,
        record: &TransferRecord,
        detail: &str,
    ) -> Result<(), EngineError> {
        warn!(
            transfer_id = %record.transfer_id,
            payment_ref = %record.payment_ref,
            detail,
            "Refund failed, flagging for manual intervention"
        );

        self.store
            .finish_refund(
                record.transfer_id,
                PaymentSubState::RefundFailed,
                None,
                true,
            )
            .await?;

        self.record_incident(
            record,
            IncidentKind::RefundFailure,
            IncidentPriority::High,
            json!({
                "payment_ref": record.payment_ref,
                "amount_minor": record.total_charged_minor,
                "error": detail,
                "failure_reason": record.failure_reason,
            }),
        )
        .await;

        Ok(())
    }

    /// Incident writes must never mask the refund outcome. A failed
    /// write is logged at error level with everything an operator needs
    /// to reconstruct the incident by hand.
    async fn record_incident(
        &self,
        record: &TransferRecord,
        kind: IncidentKind,
        priority: IncidentPriority,
        detail: serde_json::Value,
    ) {
        let incident = Incident::new(record.transfer_id, kind, priority, detail.clone());
        if let Err(e) = self.incidents.record(&incident).await {
            error!(
                transfer_id = %record.transfer_id,
                kind = kind.as_str(),
                priority = priority.as_str(),
                %detail,
                error = %e,
                "Failed to record incident"
            );
        }
    }
}
