//! Money Conversion Module
//!
//! All amounts are integer minor units (`u64`) end to end. The only place
//! a fractional value exists is inside [`convert_to_payout_minor`], the
//! single system-wide conversion and rounding point.
//!
//! ## Internal Representation
//! - Source amounts are minor units of the capture currency (e.g. kobo
//!   for NGN, scale 2)
//! - Payout amounts are whole units of the destination currency (mobile
//!   money wallets settle in whole shillings, scale 0)

use rust_decimal::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

use crate::error::EngineError;

/// Money conversion errors
#[derive(Debug, Error)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Exchange rate must be positive")]
    InvalidRate,

    #[error("Payout currency not supported: {0}")]
    UnsupportedCurrency(String),

    #[error("Amount below minimum of {minimum}")]
    BelowMinimum { minimum: u64 },

    #[error("Amount above maximum of {maximum}")]
    AboveMaximum { maximum: u64 },
}

impl From<MoneyError> for EngineError {
    fn from(e: MoneyError) -> Self {
        match e {
            MoneyError::InvalidAmount => EngineError::InvalidAmount,
            MoneyError::BelowMinimum { minimum } => EngineError::AmountTooSmall { minimum },
            MoneyError::AboveMaximum { maximum } => EngineError::AmountTooLarge { maximum },
            MoneyError::UnsupportedCurrency(c) => EngineError::UnsupportedCurrency(c),
            other => EngineError::InvalidAmountFormat(other.to_string()),
        }
    }
}

// ============================================================================
// Parse: Client → Internal (String → u64 minor units)
// ============================================================================

/// Convert a client amount string to minor units
///
/// # Errors
/// * `PrecisionOverflow` - more decimal places than the currency allows
/// * `InvalidAmount` - zero or signed amount
/// * `Overflow` - result would overflow u64
/// * `InvalidFormat` - anything that is not plain decimal notation
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<u64, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            // Strict: both sides of the dot must be non-empty, so ".5"
            // and "5." are rejected rather than guessed at.
            if parts[0].is_empty() || parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "both sides of the decimal point must be present".into(),
                ));
            }
            if decimals == 0 {
                return Err(MoneyError::InvalidFormat(
                    "decimals is 0, but dot provided".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    // No silent truncation
    if frac.len() > decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: decimals,
        });
    }

    let whole_num: u64 = whole.parse::<u64>().map_err(|e| {
        let err_str = e.to_string();
        if err_str.contains("too large") || err_str.contains("overflow") {
            MoneyError::Overflow
        } else {
            MoneyError::InvalidFormat(format!("invalid character in whole part: {}", whole))
        }
    })?;

    let frac_num: u64 = if decimals == 0 || frac.is_empty() {
        0
    } else {
        let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
        frac_padded[..decimals as usize]
            .parse::<u64>()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    let multiplier = 10u64.pow(decimals);
    let amount = whole_num
        .checked_mul(multiplier)
        .and_then(|v: u64| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)?;

    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Convert minor units to a display string
pub fn format_amount(value: u64, decimals: u32) -> String {
    let decimal_value = Decimal::from(value) / Decimal::from(10u64.pow(decimals));
    format!("{:.prec$}", decimal_value, prec = decimals as usize)
}

// ============================================================================
// Convert: source minor units → payout minor units
// ============================================================================

/// Convert a source amount to destination minor units at the given rate.
///
/// THE single conversion point. `rate` is destination units per one major
/// source unit. Rounds half away from zero to whole destination minor
/// units; no other code path may round.
pub fn convert_to_payout_minor(
    source_minor: u64,
    source_scale: u32,
    rate: Decimal,
) -> Result<u64, MoneyError> {
    if rate <= Decimal::ZERO {
        return Err(MoneyError::InvalidRate);
    }
    if source_minor == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    let source_major = Decimal::from(source_minor) / Decimal::from(10u64.pow(source_scale));
    let payout = (source_major * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    payout.to_u64().ok_or(MoneyError::Overflow)
}

// ============================================================================
// Per-currency payout bounds
// ============================================================================

/// Immutable per-currency payout limits, injected at startup.
#[derive(Debug, Clone)]
pub struct CurrencyLimits {
    limits: HashMap<String, (u64, u64)>,
}

impl CurrencyLimits {
    pub fn new(entries: impl IntoIterator<Item = (String, u64, u64)>) -> Self {
        let limits = entries
            .into_iter()
            .map(|(currency, min, max)| (currency, (min, max)))
            .collect();
        Self { limits }
    }

    /// Mobile money corridor defaults: KES 10 floor, KES 150,000
    /// per-transaction wallet cap.
    pub fn kenya_defaults() -> Self {
        Self::new([("KES".to_string(), 10, 150_000)])
    }

    /// Validate a payout amount against the currency's bounds.
    ///
    /// Zero is rejected before the bounds are consulted, so a currency
    /// with `min = 0` still cannot produce an empty payout.
    pub fn validate_payout_amount(
        &self,
        currency: &str,
        amount_minor: u64,
    ) -> Result<(), MoneyError> {
        if amount_minor == 0 {
            return Err(MoneyError::InvalidAmount);
        }

        let (min, max) = self
            .limits
            .get(currency)
            .copied()
            .ok_or_else(|| MoneyError::UnsupportedCurrency(currency.to_string()))?;

        if amount_minor < min {
            return Err(MoneyError::BelowMinimum { minimum: min });
        }
        if amount_minor > max {
            return Err(MoneyError::AboveMaximum { maximum: max });
        }

        Ok(())
    }
}
