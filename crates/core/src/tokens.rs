//! Single-use tokens for email verification and password reset.
//!
//! The plaintext goes out by email exactly once; only its SHA-256 digest is
//! stored.

use rand::Rng;

use crate::hashing;

/// Length of a generated token (alphanumeric characters).
pub const TOKEN_LENGTH: usize = 48;

pub const PURPOSE_EMAIL_VERIFICATION: &str = "email_verification";
pub const PURPOSE_PASSWORD_RESET: &str = "password_reset";

/// Email verification links stay valid for a day.
pub const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;
/// Password reset links stay valid for an hour.
pub const PASSWORD_RESET_TTL_HOURS: i64 = 1;

/// A freshly generated token.
pub struct GeneratedToken {
    /// Sent to the user, never stored.
    pub plaintext: String,
    /// SHA-256 hex digest, stored in `verification_tokens`.
    pub hash: String,
}

/// Generate a random token and its digest.
pub fn generate_token() -> GeneratedToken {
    let plaintext: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect();
    let hash = hash_token(&plaintext);
    GeneratedToken { plaintext, hash }
}

/// Digest a token for lookup.
pub fn hash_token(token: &str) -> String {
    hashing::digest_secret(token)
}

/// Lifetime in hours for a token purpose.
pub fn ttl_hours(purpose: &str) -> i64 {
    match purpose {
        PURPOSE_PASSWORD_RESET => PASSWORD_RESET_TTL_HOURS,
        _ => EMAIL_VERIFICATION_TTL_HOURS,
    }
}
