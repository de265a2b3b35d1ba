//! Subscription model and DTOs.

use onenumber_core::types::{DbId, MinorUnits, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `subscriptions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: DbId,
    pub user_id: DbId,
    pub phone_number_id: DbId,
    pub billing_cycle: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: String,
    pub auto_renew: bool,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Subscription joined with the number it covers, for dashboard lists.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubscriptionSummary {
    pub id: DbId,
    pub user_id: DbId,
    pub phone_number_id: DbId,
    pub number: String,
    pub display_number: String,
    pub billing_cycle: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: String,
    pub auto_renew: bool,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for creating a pending subscription at checkout.
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub user_id: DbId,
    pub phone_number_id: DbId,
    pub billing_cycle: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub auto_renew: bool,
}

/// Admin list filter.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionFilter {
    pub status: Option<String>,
    pub user_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
