//! Webhook Ingestion
//!
//! Authenticated processor callbacks. The signature gates everything:
//! no parsing and no side effect happens before it checks out. Status
//! movement goes through the guarded transition, so a re-delivered or
//! out-of-order event can never un-finish a transfer.

pub mod signature;

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::compensation::CompensationHandler;
use crate::error::EngineError;
use crate::ledger::{LedgerStore, TransferStatus, transition};

/// Parsed webhook envelope. `data` fields are optional because each
/// event type carries a different subset.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    payout_ref: Option<String>,
    status: Option<String>,
    failure_reason: Option<String>,
    settlement_ref: Option<String>,
}

/// What the ingestor did with a delivery. All variants are acked with
/// 200 so the sender never retry-storms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    /// Transfer status moved
    Applied,
    /// Delivery carried no new information (re-delivery, equal status,
    /// terminal transfer, lost race)
    NoOp,
    /// Event type or payout ref we do not track
    Ignored,
}

pub struct WebhookIngestor {
    store: Arc<dyn LedgerStore>,
    compensator: Arc<CompensationHandler>,
    secret: String,
}

impl WebhookIngestor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        compensator: Arc<CompensationHandler>,
        secret: String,
    ) -> Self {
        Self {
            store,
            compensator,
            secret,
        }
    }

    /// Ingest one delivery. `raw_body` is the unparsed request body the
    /// signature was computed over.
    pub async fn handle(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookAck, EngineError> {
        signature::verify(&self.secret, raw_body, signature_header)?;

        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| EngineError::Reconciliation(format!("malformed webhook body: {}", e)))?;

        match envelope.event_type.as_str() {
            "payout.completed" | "payout.failed" => self.handle_payout_event(&envelope).await,
            other => {
                info!(event_type = other, "Ignoring unrecognized webhook event type");
                Ok(WebhookAck::Ignored)
            }
        }
    }

    async fn handle_payout_event(
        &self,
        envelope: &WebhookEnvelope,
    ) -> Result<WebhookAck, EngineError> {
        let Some(payout_ref) = envelope.data.payout_ref.as_deref() else {
            warn!(
                event_type = %envelope.event_type,
                "Payout event without payout_ref, ignoring"
            );
            return Ok(WebhookAck::Ignored);
        };

        let Some(record) = self.store.get_by_payout_ref(payout_ref).await? else {
            warn!(payout_ref, "Webhook for unknown payout_ref, ignoring");
            return Ok(WebhookAck::Ignored);
        };

        let processor_status = envelope
            .data
            .status
            .as_deref()
            .unwrap_or(match envelope.event_type.as_str() {
                "payout.completed" => "completed",
                _ => "failed",
            });

        let applied = transition::apply_processor_status(
            self.store.as_ref(),
            &record,
            processor_status,
            envelope.data.failure_reason.as_deref(),
            envelope.data.settlement_ref.as_deref(),
        )
        .await?;

        match applied {
            transition::Applied::Updated(TransferStatus::Failed) => {
                // Re-read so the compensator sees the persisted reason
                let failed = self
                    .store
                    .get(record.transfer_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::TransferNotFound(record.transfer_id.to_string())
                    })?;
                self.compensator.handle_payout_failure(&failed).await?;
                Ok(WebhookAck::Applied)
            }
            transition::Applied::Updated(_) => Ok(WebhookAck::Applied),
            transition::Applied::Unchanged
            | transition::Applied::AlreadyTerminal
            | transition::Applied::Raced => Ok(WebhookAck::NoOp),
            transition::Applied::UnmappedStatus => Ok(WebhookAck::Ignored),
        }
    }
}
