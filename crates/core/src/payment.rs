//! Payment transaction statuses, purposes and merchant reference generation.

use rand::Rng;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status constants
// ---------------------------------------------------------------------------

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";
/// Checkout never completed before the number reservation lapsed.
pub const STATUS_ABANDONED: &str = "abandoned";

pub const VALID_STATUSES: &[&str] = &[STATUS_PENDING, STATUS_SUCCESS, STATUS_FAILED, STATUS_ABANDONED];

/// Once a transaction leaves `pending` it is never modified again.
pub fn is_terminal(status: &str) -> bool {
    matches!(status, STATUS_SUCCESS | STATUS_FAILED | STATUS_ABANDONED)
}

/// Validate that a status string is one of the known statuses.
pub fn validate_status(status: &str) -> Result<(), CoreError> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid payment status '{status}'. Must be one of: {VALID_STATUSES:?}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Purposes
// ---------------------------------------------------------------------------

/// First payment for a freshly reserved number.
pub const PURPOSE_NEW_SUBSCRIPTION: &str = "new_subscription";
/// Extends an existing subscription by one cycle.
pub const PURPOSE_RENEWAL: &str = "renewal";

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Prefix of every merchant reference issued by this service.
pub const REFERENCE_PREFIX: &str = "ONE";

/// Length of the random suffix of a reference.
const REFERENCE_RANDOM_LEN: usize = 12;

/// Generate a unique merchant reference: `PREFIX-yyyymmddHHMMSS-XXXXXXXXXXXX`.
pub fn generate_reference(prefix: &str, now: Timestamp) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(REFERENCE_RANDOM_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{prefix}-{}-{suffix}", now.format("%Y%m%d%H%M%S"))
}

/// Cheap shape check before hitting the database with a reference from a URL.
pub fn validate_reference(reference: &str) -> Result<(), CoreError> {
    let ok = !reference.is_empty()
        && reference.len() <= 64
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("Invalid payment reference '{reference}'")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn reference_has_prefix_timestamp_and_suffix() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 5).unwrap();
        let reference = generate_reference(REFERENCE_PREFIX, now);
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ONE");
        assert_eq!(parts[1], "20261018093005");
        assert_eq!(parts[2].len(), 12);
        assert!(parts[2].chars().all(|c| !c.is_ascii_lowercase()));
        assert!(validate_reference(&reference).is_ok());
    }

    #[test]
    fn references_are_unique() {
        let now = Utc::now();
        assert_ne!(
            generate_reference(REFERENCE_PREFIX, now),
            generate_reference(REFERENCE_PREFIX, now)
        );
    }

    #[test]
    fn reference_validation_rejects_garbage() {
        assert!(validate_reference("").is_err());
        assert!(validate_reference("abc/../x").is_err());
        assert!(validate_reference(&"A".repeat(65)).is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!is_terminal(STATUS_PENDING));
        assert!(is_terminal(STATUS_SUCCESS));
        assert!(is_terminal(STATUS_FAILED));
        assert!(is_terminal(STATUS_ABANDONED));
        assert!(validate_status("refunded").is_err());
    }
}
