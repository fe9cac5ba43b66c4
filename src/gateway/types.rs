//! API Request/Response Types
//!
//! - `ApiResponse<T>`: unified response wrapper
//! - `error_codes`: stable numeric codes for clients
//! - `TransferResponse`: the public view of a transfer

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ledger::{PaymentSubState, TransferRecord};
use crate::money;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const MALFORMED_RECIPIENT: i32 = 1002;
    pub const UNKNOWN_PREFIX: i32 = 1003;
    pub const AMOUNT_OUT_OF_RANGE: i32 = 1004;
    pub const UNSUPPORTED_CURRENCY: i32 = 1005;
    pub const CAPTURE_NOT_CONFIRMED: i32 = 1006;

    // Auth errors (2xxx)
    pub const KYC_REQUIRED: i32 = 2001;
    pub const INVALID_SIGNATURE: i32 = 2002;

    // Processor errors (3xxx)
    pub const PAYOUT_REJECTED: i32 = 3001;

    // Resource errors (4xxx)
    pub const TRANSFER_NOT_FOUND: i32 = 4001;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

/// Numeric client code for an engine error.
pub fn error_code_for(err: &EngineError) -> i32 {
    match err {
        EngineError::MalformedRecipient(_) => error_codes::MALFORMED_RECIPIENT,
        EngineError::UnknownPrefix(_) => error_codes::UNKNOWN_PREFIX,
        EngineError::InvalidAmount
        | EngineError::AmountTooSmall { .. }
        | EngineError::AmountTooLarge { .. } => error_codes::AMOUNT_OUT_OF_RANGE,
        EngineError::InvalidAmountFormat(_) => error_codes::INVALID_PARAMETER,
        EngineError::UnsupportedCurrency(_) => error_codes::UNSUPPORTED_CURRENCY,
        EngineError::CaptureNotConfirmed { .. } => error_codes::CAPTURE_NOT_CONFIRMED,
        EngineError::KycRequired(_) => error_codes::KYC_REQUIRED,
        EngineError::InvalidSignature => error_codes::INVALID_SIGNATURE,
        EngineError::Processor { .. } => error_codes::PAYOUT_REJECTED,
        EngineError::TransferNotFound(_) => error_codes::TRANSFER_NOT_FOUND,
        EngineError::Network(_) => error_codes::SERVICE_UNAVAILABLE,
        EngineError::Ledger(_)
        | EngineError::Reconciliation(_)
        | EngineError::Compensation(_) => error_codes::INTERNAL_ERROR,
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub user_id: u64,
    /// Source amount as a decimal string, e.g. "5000.00"
    pub amount: String,
    pub currency: String,
    pub recipient: String,
    /// Capture reference from the payment processor
    pub payment_ref: String,
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Public view of a transfer. Internal processor references and raw
/// failure codes never appear here.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub transfer_id: String,
    pub status: String,
    pub source_amount: String,
    pub fee: String,
    pub total_charged: String,
    pub source_currency: String,
    pub payout_amount: String,
    pub payout_currency: String,
    pub recipient: String,
    pub network: String,
    pub payment_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub refunded: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Source currency uses 2 decimals, payout currency uses 0.
const SOURCE_SCALE: u32 = 2;
const PAYOUT_SCALE: u32 = 0;

impl From<&TransferRecord> for TransferResponse {
    fn from(record: &TransferRecord) -> Self {
        Self {
            transfer_id: record.transfer_id.to_string(),
            status: record.status.as_str().to_string(),
            source_amount: money::format_amount(record.source_amount_minor, SOURCE_SCALE),
            fee: money::format_amount(record.fee_minor, SOURCE_SCALE),
            total_charged: money::format_amount(record.total_charged_minor, SOURCE_SCALE),
            source_currency: record.source_currency.clone(),
            payout_amount: money::format_amount(record.payout_amount_minor, PAYOUT_SCALE),
            payout_currency: record.payout_currency.clone(),
            recipient: record.recipient_local.clone(),
            network: record.recipient_network.clone(),
            payment_ref: record.payment_ref.clone(),
            failure_reason: record
                .failure_reason
                .as_deref()
                .map(public_failure_reason),
            refunded: record.refund_state == Some(PaymentSubState::Refunded),
            created_at: record.created_at,
        }
    }
}

/// Translate a stored failure reason into client-safe text. Stored
/// reasons lead with the processor's code ("code: detail"); the code
/// selects the message and never leaves the system.
fn public_failure_reason(stored: &str) -> String {
    let code = stored.split(':').next().unwrap_or(stored).trim();
    match code {
        "insufficient_float" => {
            "The payout service is temporarily unable to fund this transfer".to_string()
        }
        "invalid_destination" => {
            "The recipient number was rejected by the mobile money network".to_string()
        }
        "unsupported_network" => {
            "The recipient's mobile network is not supported for payouts".to_string()
        }
        _ => "The payout could not be completed".to_string(),
    }
}
