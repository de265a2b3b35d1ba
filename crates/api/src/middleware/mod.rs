//! Request extractors for authentication, authorization and client metadata.
//!
//! - [`auth::AuthUser`] -- the authenticated caller from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- requires the `admin` role.
//! - [`client_info::ClientInfo`] -- IP address and user agent for audit rows.

pub mod auth;
pub mod client_info;
pub mod rbac;
