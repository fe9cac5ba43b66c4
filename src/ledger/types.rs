//! Transfer Ledger Core Types

use std::fmt;
use std::str::FromStr;

use super::state::{PaymentSubState, TransferStatus};
use crate::recipient::RecipientValidation;

/// Transfer ID - ULID-based unique identifier
///
/// Using ULID provides:
/// - Monotonic, sortable IDs
/// - No coordination needed between gateway instances
/// - 128-bit with good entropy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }

    /// Idempotency key sent to the payout processor.
    ///
    /// A pure function of the transfer id. No wall-clock component, so a
    /// resubmission after a crash or timeout reuses the same key and the
    /// processor deduplicates it.
    pub fn idempotency_key(&self) -> String {
        format!("payout-{}", self.0)
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Transfer record stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct TransferRecord {
    /// Unique transfer ID (ULID, also the DB primary key)
    pub transfer_id: TransferId,
    pub user_id: u64,

    /// Capture amount in source minor units (before fee)
    pub source_amount_minor: u64,
    /// Service fee in source minor units
    pub fee_minor: u64,
    /// Total charged to the sender: amount + fee
    pub total_charged_minor: u64,
    pub source_currency: String,

    /// Payout amount in destination minor units
    pub payout_amount_minor: u64,
    pub payout_currency: String,

    /// Recipient as submitted
    pub recipient_raw: String,
    /// Canonical local form: 0XXXXXXXXX
    pub recipient_local: String,
    pub recipient_network: String,
    pub routing_code: String,

    /// Capture reference at the payment processor
    pub payment_ref: String,
    /// Payout reference at the payout processor. NULL until a submission
    /// is accepted; the join key for webhooks and the sweep.
    pub payout_ref: Option<String>,
    /// Stored copy of the derived idempotency key
    pub idempotency_key: String,

    pub status: TransferStatus,
    pub failure_reason: Option<String>,
    /// Settlement batch reference, set when the processor reports one
    pub settlement_ref: Option<String>,

    /// Refund sub-state, NULL until compensation touches this transfer
    pub refund_state: Option<PaymentSubState>,
    pub refund_ref: Option<String>,
    pub requires_manual_intervention: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransferRecord {
    /// Create a new transfer record in PENDING state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transfer_id: TransferId,
        user_id: u64,
        source_amount_minor: u64,
        fee_minor: u64,
        total_charged_minor: u64,
        source_currency: String,
        payout_amount_minor: u64,
        payout_currency: String,
        recipient: &RecipientValidation,
        payment_ref: String,
    ) -> Self {
        let now = chrono::Utc::now();
        let idempotency_key = transfer_id.idempotency_key();

        Self {
            transfer_id,
            user_id,
            source_amount_minor,
            fee_minor,
            total_charged_minor,
            source_currency,
            payout_amount_minor,
            payout_currency,
            recipient_raw: recipient.raw.clone(),
            recipient_local: recipient.local_number.clone(),
            recipient_network: recipient.network.clone(),
            routing_code: recipient.routing_code.to_string(),
            payment_ref,
            payout_ref: None,
            idempotency_key,
            status: TransferStatus::Pending,
            failure_reason: None,
            settlement_ref: None,
            refund_state: None,
            refund_ref: None,
            requires_manual_intervention: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Full MSISDN for the payout destination
    pub fn msisdn(&self) -> String {
        format!("254{}", &self.recipient_local[1..])
    }
}

impl fmt::Display for TransferRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] user={} {} {} -> {} {} to {} ({}) status={}",
            self.transfer_id,
            self.user_id,
            self.source_amount_minor,
            self.source_currency,
            self.payout_amount_minor,
            self.payout_currency,
            self.recipient_local,
            self.recipient_network,
            self.status
        )
    }
}
