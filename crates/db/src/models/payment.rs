//! Payment transaction model and DTOs.

use onenumber_core::types::{DbId, MinorUnits, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `payment_transactions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentTransaction {
    pub id: DbId,
    pub user_id: DbId,
    pub subscription_id: DbId,
    pub reference: String,
    pub gateway: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: String,
    pub purpose: String,
    pub authorization_url: Option<String>,
    /// Raw verification payload from the gateway; kept for reconciliation.
    #[serde(skip_serializing)]
    pub gateway_response: Option<serde_json::Value>,
    pub paid_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for recording a new pending transaction.
#[derive(Debug, Clone)]
pub struct CreatePaymentTransaction {
    pub user_id: DbId,
    pub subscription_id: DbId,
    pub reference: String,
    pub gateway: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub purpose: String,
}

/// Admin list filter.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<String>,
    pub user_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
