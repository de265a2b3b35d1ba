//! Payment gateway integration.
//!
//! - [`gateway`]: the [`PaymentGateway`] trait the API layer depends on.
//! - [`budpay`]: HTTP client for the BudPay REST API.
//! - [`money`]: conversion between stored minor units and the gateway's
//!   major-unit decimal strings.
//! - [`signature`] and [`webhook`]: callback authentication and parsing.

pub mod budpay;
pub mod gateway;
pub mod money;
pub mod signature;
pub mod webhook;

pub use budpay::{BudPayClient, BudPayConfig};
pub use gateway::{
    GatewayError, GatewayPaymentStatus, InitializeRequest, InitializedPayment, PaymentGateway,
    VerifiedPayment,
};
