//! Subscription billing cycles, pricing and lifecycle transitions.

use chrono::Months;

use crate::error::CoreError;
use crate::types::{MinorUnits, Timestamp};

// ---------------------------------------------------------------------------
// Status constants
// ---------------------------------------------------------------------------

/// Created at checkout, waiting for the first payment.
pub const STATUS_PENDING: &str = "pending";
/// Paid for the current period.
pub const STATUS_ACTIVE: &str = "active";
/// Renewal payment failed; still inside the current period.
pub const STATUS_PAST_DUE: &str = "past_due";
/// Cancelled by the customer or an admin; the number is kept until the
/// period ends.
pub const STATUS_CANCELLED: &str = "cancelled";
/// Period ended (or checkout abandoned); the number has been released.
pub const STATUS_EXPIRED: &str = "expired";

pub const VALID_STATUSES: &[&str] = &[
    STATUS_PENDING,
    STATUS_ACTIVE,
    STATUS_PAST_DUE,
    STATUS_CANCELLED,
    STATUS_EXPIRED,
];

/// Statuses that still hold a phone number for the subscriber.
pub const HOLDING_STATUSES: &[&str] = &[STATUS_ACTIVE, STATUS_PAST_DUE, STATUS_CANCELLED];

// ---------------------------------------------------------------------------
// Billing cycles
// ---------------------------------------------------------------------------

pub const CYCLE_MONTHLY: &str = "monthly";
pub const CYCLE_QUARTERLY: &str = "quarterly";
pub const CYCLE_SEMI_ANNUAL: &str = "semi_annual";
pub const CYCLE_ANNUAL: &str = "annual";

pub const VALID_CYCLES: &[&str] = &[CYCLE_MONTHLY, CYCLE_QUARTERLY, CYCLE_SEMI_ANNUAL, CYCLE_ANNUAL];

/// Length and discount of a billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTerms {
    pub months: u32,
    pub discount_percent: i64,
}

/// Look up the terms for a billing cycle name.
pub fn cycle_terms(cycle: &str) -> Result<CycleTerms, CoreError> {
    let terms = match cycle {
        CYCLE_MONTHLY => CycleTerms { months: 1, discount_percent: 0 },
        CYCLE_QUARTERLY => CycleTerms { months: 3, discount_percent: 5 },
        CYCLE_SEMI_ANNUAL => CycleTerms { months: 6, discount_percent: 10 },
        CYCLE_ANNUAL => CycleTerms { months: 12, discount_percent: 15 },
        _ => {
            return Err(CoreError::Validation(format!(
                "Invalid billing cycle '{cycle}'. Must be one of: {VALID_CYCLES:?}"
            )))
        }
    };
    Ok(terms)
}

/// Price of one billing cycle for a number with the given monthly price.
///
/// `monthly_price * months * (100 - discount) / 100`, rounded down.
pub fn compute_amount(monthly_price: MinorUnits, cycle: &str) -> Result<MinorUnits, CoreError> {
    let terms = cycle_terms(cycle)?;
    monthly_price
        .checked_mul(i64::from(terms.months))
        .and_then(|gross| gross.checked_mul(100 - terms.discount_percent))
        .map(|scaled| scaled / 100)
        .ok_or_else(|| CoreError::Validation("Subscription amount overflows".into()))
}

/// End of a billing period that starts at `start`.
///
/// Uses calendar months, so Jan 31 + 1 month lands on the last day of
/// February.
pub fn period_end(start: Timestamp, cycle: &str) -> Result<Timestamp, CoreError> {
    let terms = cycle_terms(cycle)?;
    start
        .checked_add_months(Months::new(terms.months))
        .ok_or_else(|| CoreError::Internal("Billing period end is out of range".into()))
}

/// Start of a renewed period: renewals paid early stack on the current
/// period, late renewals start now.
pub fn renewal_start(current_period_end: Option<Timestamp>, now: Timestamp) -> Timestamp {
    match current_period_end {
        Some(end) if end > now => end,
        _ => now,
    }
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// Returns the set of statuses that `from_status` may transition to.
pub fn valid_transitions(from_status: &str) -> &'static [&'static str] {
    match from_status {
        STATUS_PENDING => &[STATUS_ACTIVE, STATUS_EXPIRED],
        STATUS_ACTIVE => &[STATUS_ACTIVE, STATUS_PAST_DUE, STATUS_CANCELLED, STATUS_EXPIRED],
        STATUS_PAST_DUE => &[STATUS_ACTIVE, STATUS_CANCELLED, STATUS_EXPIRED],
        STATUS_CANCELLED => &[STATUS_EXPIRED],
        _ => &[],
    }
}

/// Validate that a status transition from `current` to `next` is allowed.
pub fn validate_transition(current: &str, next: &str) -> Result<(), CoreError> {
    let allowed = valid_transitions(current);
    if allowed.contains(&next) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Cannot move subscription from '{current}' to '{next}'. Allowed: {allowed:?}"
        )))
    }
}

/// Validate that a status string is one of the known statuses.
pub fn validate_status(status: &str) -> Result<(), CoreError> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid subscription status '{status}'. Must be one of: {VALID_STATUSES:?}"
        )))
    }
}

/// Whether a subscription in `status` can be renewed.
pub fn is_renewable(status: &str) -> bool {
    status == STATUS_ACTIVE || status == STATUS_PAST_DUE
}
