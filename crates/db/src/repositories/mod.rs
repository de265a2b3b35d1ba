//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod audit_repo;
pub mod payment_repo;
pub mod phone_number_repo;
pub mod role_repo;
pub mod session_repo;
pub mod subscription_repo;
pub mod user_repo;
pub mod verification_token_repo;

pub use audit_repo::AuditLogRepo;
pub use payment_repo::PaymentTransactionRepo;
pub use phone_number_repo::PhoneNumberRepo;
pub use role_repo::RoleRepo;
pub use session_repo::SessionRepo;
pub use subscription_repo::SubscriptionRepo;
pub use user_repo::UserRepo;
pub use verification_token_repo::VerificationTokenRepo;
