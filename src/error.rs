//! Engine Error Types
//!
//! Every failure the engine can surface, grouped by who has to act on it:
//! the caller (validation, authorization), the processor (rejection),
//! nobody yet (transient network), or operations (storage, compensation).

use thiserror::Error;

/// Engine error taxonomy
///
/// Error codes are stable strings used in logs and API responses.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    // === Validation Errors ===
    #[error("Recipient number is malformed: {0}")]
    MalformedRecipient(String),

    #[error("Recipient prefix is not recognized: {0}")]
    UnknownPrefix(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount is below the minimum of {minimum} minor units")]
    AmountTooSmall { minimum: u64 },

    #[error("Amount exceeds the maximum of {maximum} minor units")]
    AmountTooLarge { maximum: u64 },

    #[error("Payout currency not supported: {0}")]
    UnsupportedCurrency(String),

    #[error("Amount format is invalid: {0}")]
    InvalidAmountFormat(String),

    #[error("Payment {payment_ref} is not a confirmed capture (status: {status})")]
    CaptureNotConfirmed {
        payment_ref: String,
        status: String,
    },

    // === Authorization Errors ===
    #[error("KYC verification required: {0}")]
    KycRequired(String),

    #[error("Webhook signature is missing or invalid")]
    InvalidSignature,

    // === Processor Errors ===
    /// Business rejection from the payout processor. Persisted onto the
    /// transfer before being reported.
    #[error("Payout rejected by processor ({code}): {message}")]
    Processor {
        code: String,
        reason: String,
        message: String,
    },

    // === Transient Errors ===
    /// Transport-level failure. The operation may or may not have reached
    /// the remote side; safe to retry with the same idempotency key.
    #[error("Network error: {0}")]
    Network(String),

    // === Storage Errors ===
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    // === Operational Errors ===
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    #[error("Compensation error: {0}")]
    Compensation(String),
}

impl EngineError {
    /// Get the error code for structured logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MalformedRecipient(_) => "MALFORMED_RECIPIENT",
            EngineError::UnknownPrefix(_) => "UNKNOWN_PREFIX",
            EngineError::InvalidAmount => "INVALID_AMOUNT",
            EngineError::AmountTooSmall { .. } => "AMOUNT_TOO_SMALL",
            EngineError::AmountTooLarge { .. } => "AMOUNT_TOO_LARGE",
            EngineError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            EngineError::InvalidAmountFormat(_) => "INVALID_AMOUNT_FORMAT",
            EngineError::CaptureNotConfirmed { .. } => "CAPTURE_NOT_CONFIRMED",
            EngineError::KycRequired(_) => "KYC_REQUIRED",
            EngineError::InvalidSignature => "INVALID_SIGNATURE",
            EngineError::Processor { .. } => "PROCESSOR_REJECTED",
            EngineError::Network(_) => "NETWORK_ERROR",
            EngineError::Ledger(_) => "LEDGER_ERROR",
            EngineError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            EngineError::Reconciliation(_) => "RECONCILIATION_ERROR",
            EngineError::Compensation(_) => "COMPENSATION_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::MalformedRecipient(_)
            | EngineError::UnknownPrefix(_)
            | EngineError::InvalidAmount
            | EngineError::AmountTooSmall { .. }
            | EngineError::AmountTooLarge { .. }
            | EngineError::UnsupportedCurrency(_)
            | EngineError::InvalidAmountFormat(_) => 400,
            EngineError::CaptureNotConfirmed { .. } => 422,
            EngineError::KycRequired(_) => 403,
            EngineError::InvalidSignature => 401,
            EngineError::Processor { .. } => 422,
            EngineError::TransferNotFound(_) => 404,
            EngineError::Network(_) => 503,
            EngineError::Ledger(_)
            | EngineError::Reconciliation(_)
            | EngineError::Compensation(_) => 500,
        }
    }

    /// True for failures that are safe to retry with the same
    /// idempotency key.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Network(_))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Ledger(e.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}
