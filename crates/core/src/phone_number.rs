//! Phone-number inventory rules: statuses, transitions, number types and
//! E.164 normalization.
//!
//! Every inventory mutation in the repository layer is a compare-and-set on
//! `status`, so the transition table here is the single source of truth for
//! which moves an admin (or the checkout flow) may request.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::types::MinorUnits;

// ---------------------------------------------------------------------------
// Status constants
// ---------------------------------------------------------------------------

/// In inventory and purchasable.
pub const STATUS_AVAILABLE: &str = "available";
/// Held for a customer during checkout until `reserved_until`.
pub const STATUS_RESERVED: &str = "reserved";
/// Owned by a customer with a paid subscription.
pub const STATUS_ASSIGNED: &str = "assigned";
/// Temporarily withdrawn by an admin (abuse, carrier issue).
pub const STATUS_SUSPENDED: &str = "suspended";
/// Permanently removed from sale.
pub const STATUS_RETIRED: &str = "retired";

/// All valid phone-number statuses.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_AVAILABLE,
    STATUS_RESERVED,
    STATUS_ASSIGNED,
    STATUS_SUSPENDED,
    STATUS_RETIRED,
];

// ---------------------------------------------------------------------------
// Number types
// ---------------------------------------------------------------------------

pub const TYPE_LOCAL: &str = "local";
pub const TYPE_MOBILE: &str = "mobile";
pub const TYPE_TOLL_FREE: &str = "toll_free";
pub const TYPE_VANITY: &str = "vanity";

/// All valid number types.
pub const VALID_NUMBER_TYPES: &[&str] = &[TYPE_LOCAL, TYPE_MOBILE, TYPE_TOLL_FREE, TYPE_VANITY];

/// Minimum digit count (country code included) accepted as a phone number.
pub const MIN_DIGITS: usize = 8;
/// Maximum digit count allowed by E.164.
pub const MAX_DIGITS: usize = 15;

static VANITY_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,19}$").expect("vanity regex is valid")
});

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// Returns the set of statuses that `from_status` may transition to.
///
/// - `available` -> `reserved`, `suspended`, `retired`
/// - `reserved`  -> `available`, `assigned`
/// - `assigned`  -> `available`, `suspended`
/// - `suspended` -> `available`, `assigned`, `retired`
/// - `retired`   -> (terminal)
pub fn valid_transitions(from_status: &str) -> &'static [&'static str] {
    match from_status {
        STATUS_AVAILABLE => &[STATUS_RESERVED, STATUS_SUSPENDED, STATUS_RETIRED],
        STATUS_RESERVED => &[STATUS_AVAILABLE, STATUS_ASSIGNED],
        STATUS_ASSIGNED => &[STATUS_AVAILABLE, STATUS_SUSPENDED],
        STATUS_SUSPENDED => &[STATUS_AVAILABLE, STATUS_ASSIGNED, STATUS_RETIRED],
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
            "Cannot move phone number from '{current}' to '{next}'. Allowed: {allowed:?}"
        )))
    }
}

/// Validate that a status string is one of the known statuses.
pub fn validate_status(status: &str) -> Result<(), CoreError> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid phone number status '{status}'. Must be one of: {VALID_STATUSES:?}"
        )))
    }
}

/// Validate that a number type string is one of the known types.
pub fn validate_number_type(number_type: &str) -> Result<(), CoreError> {
    if VALID_NUMBER_TYPES.contains(&number_type) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid number type '{number_type}'. Must be one of: {VALID_NUMBER_TYPES:?}"
        )))
    }
}

/// Only numbers that nobody holds can be deleted from inventory.
pub fn is_deletable(status: &str) -> bool {
    status == STATUS_AVAILABLE || status == STATUS_RETIRED
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Translate a letter to its ITU E.161 keypad digit.
fn keypad_digit(c: char) -> Option<char> {
    let digit = match c.to_ascii_uppercase() {
        'A' | 'B' | 'C' => '2',
        'D' | 'E' | 'F' => '3',
        'G' | 'H' | 'I' => '4',
        'J' | 'K' | 'L' => '5',
        'M' | 'N' | 'O' => '6',
        'P' | 'Q' | 'R' | 'S' => '7',
        'T' | 'U' | 'V' => '8',
        'W' | 'X' | 'Y' | 'Z' => '9',
        _ => return None,
    };
    Some(digit)
}

/// Translate vanity text (e.g. `FLOWERS`) to keypad digits (`3569377`).
///
/// Digits pass through unchanged; dashes are dropped.
pub fn vanity_to_digits(text: &str) -> Result<String, CoreError> {
    if !VANITY_TEXT_RE.is_match(text) {
        return Err(CoreError::Validation(format!(
            "Invalid vanity text '{text}'. Use up to 20 letters, digits or dashes"
        )));
    }
    Ok(text
        .chars()
        .filter(|c| *c != '-')
        .map(|c| if c.is_ascii_digit() { c } else { keypad_digit(c).unwrap_or(c) })
        .collect())
}

/// Clean a catalogue search fragment such as `800 555`, `(800) 555` or
/// `flowers`.
///
/// Separators and a leading `+` are dropped; what remains must be valid
/// vanity text. Returns `None` for a blank fragment.
pub fn search_fragment(raw: &str) -> Result<Option<String>, CoreError> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    vanity_to_digits(&cleaned)?;
    Ok(Some(cleaned))
}

/// Normalize a user-entered phone number to E.164 (`+<digits>`).
///
/// Accepts spaces, dashes, dots and parentheses as separators, an optional
/// leading `+`, and vanity letters (translated via the keypad). The result
/// must contain between [`MIN_DIGITS`] and [`MAX_DIGITS`] digits and must
/// not start with `0` (the country code is required).
pub fn normalize_e164(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Phone number is required".into()));
    }

    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let mut digits = String::with_capacity(body.len());

    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            c if c.is_ascii_alphabetic() => {
                // Letters are always translatable once ASCII alphabetic.
                digits.push(keypad_digit(c).unwrap_or('0'));
            }
            other => {
                return Err(CoreError::Validation(format!(
                    "Phone number contains invalid character '{other}'"
                )));
            }
        }
    }

    if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS {
        return Err(CoreError::Validation(format!(
            "Phone number must have between {MIN_DIGITS} and {MAX_DIGITS} digits, got {}",
            digits.len()
        )));
    }
    if digits.starts_with('0') {
        return Err(CoreError::Validation(
            "Phone number must start with a country code, not 0".into(),
        ));
    }

    Ok(format!("+{digits}"))
}

/// Validate that `country_code` is 1-3 digits and prefixes the E.164 number.
pub fn validate_country_code(e164: &str, country_code: &str) -> Result<(), CoreError> {
    let valid_shape = !country_code.is_empty()
        && country_code.len() <= 3
        && country_code.chars().all(|c| c.is_ascii_digit());
    if !valid_shape {
        return Err(CoreError::Validation(format!(
            "Invalid country code '{country_code}'"
        )));
    }
    let digits = e164.strip_prefix('+').unwrap_or(e164);
    if !digits.starts_with(country_code) {
        return Err(CoreError::Validation(format!(
            "Number {e164} does not belong to country code +{country_code}"
        )));
    }
    Ok(())
}

/// Render an E.164 number for humans.
///
/// NANP numbers (`+1` and ten national digits) use `+1 (800) 555-0199`.
/// Everything else becomes `+CC` followed by 3-digit groups and a final
/// 4-digit group, e.g. `+234 801 234 5678`.
pub fn format_display(e164: &str, country_code: &str) -> String {
    let digits = e164.strip_prefix('+').unwrap_or(e164);
    let national = digits.strip_prefix(country_code).unwrap_or(digits);

    if country_code == "1" && national.len() == 10 {
        return format!(
            "+1 ({}) {}-{}",
            &national[..3],
            &national[3..6],
            &national[6..]
        );
    }

    if national.len() <= 4 {
        return format!("+{country_code} {national}");
    }

    let (head, tail) = national.split_at(national.len() - 4);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while !rest.is_empty() {
        let take = rest.len().min(3);
        let (group, remaining) = rest.split_at(take);
        groups.push(group);
        rest = remaining;
    }
    groups.push(tail);

    format!("+{country_code} {}", groups.join(" "))
}

/// A monthly price must be strictly positive.
pub fn validate_price(monthly_price: MinorUnits) -> Result<(), CoreError> {
    if monthly_price <= 0 {
        return Err(CoreError::Validation(
            "monthly_price must be greater than zero".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
