//! Audit trail constants, hash chaining and redaction.
//!
//! Every audit entry stores `integrity_hash = sha256(prev_hash | canonical)`
//! so a deleted or edited row breaks the chain at a detectable point.

use chrono::SecondsFormat;

use crate::hashing;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Action type constants
// ---------------------------------------------------------------------------

/// Known action types for audit log entries.
pub mod action_types {
    pub const REGISTER: &str = "register";
    pub const LOGIN: &str = "login";
    pub const LOGIN_FAILED: &str = "login_failed";
    pub const LOGOUT: &str = "logout";
    pub const PASSWORD_CHANGE: &str = "password_change";
    pub const PASSWORD_RESET: &str = "password_reset";
    pub const EMAIL_VERIFIED: &str = "email_verified";
    pub const USER_UPDATE: &str = "user_update";
    pub const USER_DEACTIVATE: &str = "user_deactivate";
    pub const NUMBER_CREATE: &str = "number_create";
    pub const NUMBER_UPDATE: &str = "number_update";
    pub const NUMBER_DELETE: &str = "number_delete";
    pub const NUMBER_RESERVE: &str = "number_reserve";
    pub const NUMBER_ASSIGN: &str = "number_assign";
    pub const NUMBER_RELEASE: &str = "number_release";
    pub const NUMBER_STATUS_CHANGE: &str = "number_status_change";
    pub const SUBSCRIPTION_CREATE: &str = "subscription_create";
    pub const SUBSCRIPTION_CANCEL: &str = "subscription_cancel";
    pub const SUBSCRIPTION_RENEW: &str = "subscription_renew";
    pub const SUBSCRIPTION_EXPIRE: &str = "subscription_expire";
    pub const PAYMENT_SUCCESS: &str = "payment_success";
    pub const PAYMENT_FAILED: &str = "payment_failed";
    pub const SYSTEM: &str = "system";
}

/// Entity type labels used in `audit_logs.entity_type`.
pub mod entity_types {
    pub const USER: &str = "user";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const PAYMENT: &str = "payment_transaction";
}

// ---------------------------------------------------------------------------
// Integrity hash computation
// ---------------------------------------------------------------------------

/// Known seed value for the first entry in the hash chain.
const CHAIN_SEED: &str = "ONENUMBER_AUDIT_CHAIN_V1";

/// Compute the SHA-256 integrity hash for an audit log entry.
///
/// `prev_hash` is the `integrity_hash` of the previous entry, or `None` for
/// the first entry in the chain.
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    hashing::chain_digest(prev_hash.unwrap_or(CHAIN_SEED), entry_data)
}

/// Canonical string form of the hashed fields of an entry.
///
/// The timestamp is rendered at microsecond precision, matching what
/// PostgreSQL stores, so verification reproduces the same input. Details
/// are rendered by [`canonical_json`] because JSONB does not keep key order.
pub fn canonical_entry_data(
    timestamp: Timestamp,
    user_id: Option<DbId>,
    action_type: &str,
    entity_type: Option<&str>,
    entity_id: Option<DbId>,
    details: Option<&serde_json::Value>,
) -> String {
    let mut out = format!(
        "{}|{}|{}|{}|{}|",
        timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        user_id.map_or(String::new(), |id| id.to_string()),
        action_type,
        entity_type.unwrap_or(""),
        entity_id.map_or(String::new(), |id| id.to_string()),
    );
    if let Some(details) = details {
        canonical_json(details, &mut out);
    }
    out
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                canonical_json(&map[key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_json(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Fields that should be redacted from audit log details before storage.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "authorization",
    "signature",
    "card",
    "cvv",
    "pin",
];

/// Redact sensitive fields from a JSON value, recursing into objects and
/// arrays.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}
