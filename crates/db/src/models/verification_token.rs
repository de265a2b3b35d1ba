//! Email verification / password reset token model.

use onenumber_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from `verification_tokens`.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub id: DbId,
    pub user_id: DbId,
    pub purpose: String,
    pub token_hash: String,
    pub expires_at: Timestamp,
    pub consumed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

pub struct CreateVerificationToken {
    pub user_id: DbId,
    pub purpose: String,
    pub token_hash: String,
    pub expires_at: Timestamp,
}
