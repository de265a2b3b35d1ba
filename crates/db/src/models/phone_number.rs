//! Phone number inventory model and DTOs.

use onenumber_core::types::{DbId, MinorUnits, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::subscription::Subscription;

/// A row from the `phone_numbers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PhoneNumber {
    pub id: DbId,
    /// E.164 form, e.g. `+2348012345678`.
    pub number: String,
    pub display_number: String,
    pub country_code: String,
    pub number_type: String,
    pub vanity_text: Option<String>,
    pub monthly_price: MinorUnits,
    pub currency: String,
    pub status: String,
    pub reserved_by: Option<DbId>,
    pub reserved_until: Option<Timestamp>,
    pub owner_id: Option<DbId>,
    pub assigned_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What [`PhoneNumberRepo::return_to_inventory`] changed.
///
/// [`PhoneNumberRepo::return_to_inventory`]: crate::repositories::PhoneNumberRepo::return_to_inventory
#[derive(Debug, Clone)]
pub struct InventoryReturn {
    pub number: PhoneNumber,
    /// The subscription that held the number, now expired.
    pub ended_subscription: Option<Subscription>,
    /// A checkout that was still waiting on payment, now expired.
    pub abandoned_checkout: Option<Subscription>,
    /// Pending payments of either subscription, now abandoned.
    pub abandoned_payments: u64,
}

/// Public catalogue view of a number (no holder information).
#[derive(Debug, Clone, Serialize)]
pub struct PhoneNumberListing {
    pub id: DbId,
    pub number: String,
    pub display_number: String,
    pub country_code: String,
    pub number_type: String,
    pub vanity_text: Option<String>,
    pub monthly_price: MinorUnits,
    pub currency: String,
    pub status: String,
}

impl From<PhoneNumber> for PhoneNumberListing {
    fn from(n: PhoneNumber) -> Self {
        Self {
            id: n.id,
            number: n.number,
            display_number: n.display_number,
            country_code: n.country_code,
            number_type: n.number_type,
            vanity_text: n.vanity_text,
            monthly_price: n.monthly_price,
            currency: n.currency,
            status: n.status,
        }
    }
}

/// DTO for inserting a number. `number` is already normalized to E.164.
#[derive(Debug, Clone)]
pub struct CreatePhoneNumber {
    pub number: String,
    pub display_number: String,
    pub country_code: String,
    pub number_type: String,
    pub vanity_text: Option<String>,
    pub monthly_price: MinorUnits,
    pub currency: String,
}

/// Admin edit of catalogue fields. Status changes go through
/// `PhoneNumberRepo::transition_status` instead.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePhoneNumber {
    pub number_type: Option<String>,
    pub vanity_text: Option<String>,
    pub monthly_price: Option<MinorUnits>,
    pub currency: Option<String>,
}

/// Customer-facing search over available numbers.
#[derive(Debug, Default, Deserialize)]
pub struct AvailableNumberFilter {
    pub country_code: Option<String>,
    pub number_type: Option<String>,
    /// Digits (or vanity letters) that must appear in the number.
    pub contains: Option<String>,
    pub max_price: Option<MinorUnits>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Admin inventory filter.
#[derive(Debug, Default, Deserialize)]
pub struct AdminNumberFilter {
    pub status: Option<String>,
    pub number_type: Option<String>,
    pub owner_id: Option<DbId>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Serialize)]
pub struct BulkImportResult {
    pub created: Vec<PhoneNumber>,
    /// E.164 numbers that already existed and were skipped.
    pub skipped: Vec<String>,
}
