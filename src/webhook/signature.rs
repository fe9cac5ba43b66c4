//! Webhook Signature Verification
//!
//! HMAC-SHA256 over the raw request body, hex-encoded in the signature
//! header. Verification happens before the body is parsed; the compare
//! is constant-time via `Mac::verify_slice`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::EngineError;

type HmacSha256 = Hmac<Sha256>;

/// Sign a raw body. Used by tests and the mock sender.
pub fn sign(secret: &str, raw_body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded signature against the raw body.
pub fn verify(secret: &str, raw_body: &[u8], signature_hex: &str) -> Result<(), EngineError> {
    let expected = hex::decode(signature_hex)
        .map_err(|_| EngineError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| EngineError::InvalidSignature)?;
    mac.update(raw_body);
    mac.verify_slice(&expected)
        .map_err(|_| EngineError::InvalidSignature)
}
