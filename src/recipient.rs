//! Recipient Validator
//!
//! Normalizes Kenyan mobile money numbers and resolves the carrier network
//! from the dialing prefix. Three input shapes are accepted and all
//! normalize to the canonical local form `0XXXXXXXXX`:
//!
//! - `254712345678` (international, no plus)
//! - `0712345678` (local)
//! - `712345678` (bare subscriber number)
//!
//! Formatting noise (`+`, spaces, dashes) is stripped before shape
//! matching, so `+254 712-345-678` is fine.

use std::collections::HashMap;

use crate::error::EngineError;

/// Every network routes through the one country-level mobile money rail.
pub const ROUTING_CODE: &str = "ke_mobile_money";

const COUNTRY_CODE: &str = "254";
const SUBSCRIBER_DIGITS: usize = 9;

/// One dialing prefix allocation.
#[derive(Debug, Clone)]
pub struct PrefixEntry {
    pub network: &'static str,
    /// Whether payouts to this range have been operationally verified.
    /// Unverified ranges still pass validation, with a warning attached.
    pub confirmed: bool,
}

/// Immutable prefix -> network table, injected at startup.
#[derive(Debug, Clone)]
pub struct PrefixTable {
    entries: HashMap<String, PrefixEntry>,
}

impl PrefixTable {
    pub fn new(entries: HashMap<String, PrefixEntry>) -> Self {
        Self { entries }
    }

    /// CA prefix allocations as of the last operational review.
    /// The newer 1XX ranges are live but not yet payout-verified.
    pub fn kenya_defaults() -> Self {
        let mut entries = HashMap::new();

        let mut add_range = |start: u32, end: u32, network: &'static str, confirmed: bool| {
            for p in start..=end {
                entries.insert(format!("{:03}", p), PrefixEntry { network, confirmed });
            }
        };

        add_range(700, 729, "safaricom", true);
        add_range(740, 743, "safaricom", true);
        add_range(757, 759, "safaricom", true);
        add_range(768, 769, "safaricom", true);
        add_range(790, 799, "safaricom", true);
        add_range(110, 115, "safaricom", false);

        add_range(730, 739, "airtel", true);
        add_range(750, 756, "airtel", true);
        add_range(785, 789, "airtel", true);
        add_range(100, 106, "airtel", false);

        add_range(770, 779, "telkom", true);

        Self::new(entries)
    }

    pub fn lookup(&self, prefix: &str) -> Option<&PrefixEntry> {
        self.entries.get(prefix)
    }
}

/// Outcome of a successful recipient validation.
#[derive(Debug, Clone)]
pub struct RecipientValidation {
    /// Input as the caller supplied it
    pub raw: String,
    /// Canonical local form: 0XXXXXXXXX
    pub local_number: String,
    pub network: String,
    pub routing_code: &'static str,
    pub confirmed: bool,
    pub warning: Option<String>,
}

impl RecipientValidation {
    /// Full MSISDN for the payout destination: 254XXXXXXXXX
    pub fn msisdn(&self) -> String {
        format!("{}{}", COUNTRY_CODE, &self.local_number[1..])
    }
}

/// Validate and normalize a recipient number against the prefix table.
pub fn validate_recipient(
    raw: &str,
    prefixes: &PrefixTable,
) -> Result<RecipientValidation, EngineError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let local_number = if digits.len() == COUNTRY_CODE.len() + SUBSCRIBER_DIGITS
        && digits.starts_with(COUNTRY_CODE)
    {
        format!("0{}", &digits[COUNTRY_CODE.len()..])
    } else if digits.len() == 1 + SUBSCRIBER_DIGITS && digits.starts_with('0') {
        digits.clone()
    } else if digits.len() == SUBSCRIBER_DIGITS {
        format!("0{}", digits)
    } else {
        return Err(EngineError::MalformedRecipient(raw.to_string()));
    };

    let prefix = &local_number[1..4];
    let entry = prefixes
        .lookup(prefix)
        .ok_or_else(|| EngineError::UnknownPrefix(prefix.to_string()))?;

    let warning = if entry.confirmed {
        None
    } else {
        Some(format!(
            "prefix {} ({}) has not been payout-verified",
            prefix, entry.network
        ))
    };

    Ok(RecipientValidation {
        raw: raw.to_string(),
        local_number,
        network: entry.network.to_string(),
        routing_code: ROUTING_CODE,
        confirmed: entry.confirmed,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_shapes_normalize_identically() {
        let table = PrefixTable::kenya_defaults();

        let forms = [
            "254712345678",
            "0712345678",
            "712345678",
            "+254 712-345-678",
        ];

        for form in forms {
            let v = validate_recipient(form, &table).unwrap();
            assert_eq!(v.local_number, "0712345678", "input: {}", form);
            assert_eq!(v.msisdn(), "254712345678", "input: {}", form);
            assert_eq!(v.network, "safaricom");
            assert_eq!(v.routing_code, "ke_mobile_money");
        }
    }

    #[test]
    fn test_malformed_shapes_rejected() {
        let table = PrefixTable::kenya_defaults();

        for bad in [
            "",
            "12345",
            "07123456789",   // 10 subscriber digits
            "25471234567",   // international, one digit short
            "2547123456789", // international, one digit long
            "44712345678",   // wrong country code
        ] {
            assert!(
                matches!(
                    validate_recipient(bad, &table),
                    Err(EngineError::MalformedRecipient(_))
                ),
                "should reject: {}",
                bad
            );
        }
    }

    #[test]
    fn test_unknown_prefix_surfaced() {
        let table = PrefixTable::kenya_defaults();

        // 744 is unallocated in the default table
        let err = validate_recipient("0744123456", &table).unwrap_err();
        match err {
            EngineError::UnknownPrefix(p) => assert_eq!(p, "744"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unconfirmed_prefix_warns_but_passes() {
        let table = PrefixTable::kenya_defaults();

        let v = validate_recipient("0110123456", &table).unwrap();
        assert_eq!(v.network, "safaricom");
        assert!(!v.confirmed);
        let warning = v.warning.as_deref().unwrap();
        assert!(warning.contains("110"));

        // Confirmed prefixes carry no warning
        let v = validate_recipient("0722000111", &table).unwrap();
        assert!(v.confirmed);
        assert!(v.warning.is_none());
    }

    #[test]
    fn test_network_resolution_per_carrier() {
        let table = PrefixTable::kenya_defaults();

        assert_eq!(
            validate_recipient("0733111222", &table).unwrap().network,
            "airtel"
        );
        assert_eq!(
            validate_recipient("0771111222", &table).unwrap().network,
            "telkom"
        );
    }
}
