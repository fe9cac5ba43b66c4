//! Transfer State Definitions
//!
//! State IDs are stored in PostgreSQL as SMALLINT. Forward progress is
//! positive, failure paths are negative.

use std::fmt;

/// Transfer lifecycle states
///
/// Terminal states: COMPLETED (40), FAILED (-10), CANCELLED (-30)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransferStatus {
    /// Ledger record created, payout not yet submitted
    Pending = 0,

    /// Payout submitted (or submission in flight) - funds are moving.
    /// Only the processor can end this state; there is no local cancel.
    Processing = 10,

    /// Terminal: payout delivered to the recipient wallet
    Completed = 40,

    /// Terminal: payout failed, compensation path owns the follow-up
    Failed = -10,

    /// Terminal: voided by an operator before submission. Never produced
    /// by automation.
    Cancelled = -30,
}

impl TransferStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }

    /// Get the numeric state ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransferStatus::Pending),
            10 => Some(TransferStatus::Processing),
            40 => Some(TransferStatus::Completed),
            -10 => Some(TransferStatus::Failed),
            -30 => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Processing => "PROCESSING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransferStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransferStatus::from_id(value).ok_or(())
    }
}

/// Refund sub-state on the payment side of a failed transfer.
///
/// Lives in its own nullable column, not in [`TransferStatus`]: the
/// transfer itself is already terminal FAILED when a refund runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum PaymentSubState {
    /// Capture refunded to the sender
    Refunded = 1,

    /// Refund attempt failed - requires manual intervention
    RefundFailed = 2,
}

impl PaymentSubState {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(PaymentSubState::Refunded),
            2 => Some(PaymentSubState::RefundFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSubState::Refunded => "REFUNDED",
            PaymentSubState::RefundFailed => "REFUND_FAILED",
        }
    }
}

impl fmt::Display for PaymentSubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
