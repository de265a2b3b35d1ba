//! Webhook signature verification.
//!
//! BudPay signs callbacks with `HMAC-SHA512(secret_key, raw_body)` and sends
//! the hex digest in the `merchantsignature` header.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the callback signature.
pub const SIGNATURE_HEADER: &str = "merchantsignature";

/// Hex-encoded HMAC-SHA512 of `body` keyed with `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature_hex` against the body in constant time.
///
/// Returns `false` for malformed hex as well as for mismatches.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
