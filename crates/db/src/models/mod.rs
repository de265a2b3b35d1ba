//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - A create DTO for inserts
//! - Update DTOs (all `Option` fields) for patches where the entity is editable

pub mod audit;
pub mod payment;
pub mod phone_number;
pub mod role;
pub mod session;
pub mod subscription;
pub mod user;
pub mod verification_token;

use serde::Serialize;
use sqlx::FromRow;

/// A `(status, count)` pair used by dashboard aggregates.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
