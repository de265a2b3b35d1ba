//! OneNumber domain core.
//!
//! Pure domain logic with no I/O: status machines for the phone-number
//! inventory, subscriptions and payments, pricing, token and hash helpers,
//! and the shared [`error::CoreError`] type used by every other crate.

pub mod audit;
pub mod error;
pub mod hashing;
pub mod payment;
pub mod phone_number;
pub mod roles;
pub mod search;
pub mod subscription;
pub mod tokens;
pub mod types;
