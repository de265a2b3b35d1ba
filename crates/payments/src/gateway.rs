//! Gateway abstraction used by checkout and payment finalization.

use async_trait::async_trait;
use onenumber_core::types::MinorUnits;
use serde::Serialize;

/// Errors from a payment gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code or `status: false`.
    #[error("Gateway API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Gateway message or raw body for debugging.
        message: String,
    },

    /// The gateway answered 2xx but the payload was not what we expect.
    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Everything the gateway needs to open a hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
    pub email: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub reference: String,
    pub callback_url: String,
}

/// A checkout session the customer is redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub access_code: Option<String>,
    pub reference: String,
}

/// Gateway-side state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Success,
    Failed,
    /// Not settled yet (customer still on the hosted page, bank pending).
    Pending,
}

impl GatewayPaymentStatus {
    /// Map a gateway status string. Anything unrecognised is treated as
    /// still pending so a later verification can settle it.
    pub fn from_gateway(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "success" | "successful" | "completed" => Self::Success,
            "failed" | "failure" | "declined" | "cancelled" | "abandoned" | "reversed" => {
                Self::Failed
            }
            _ => Self::Pending,
        }
    }
}

/// Result of asking the gateway about a reference.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub reference: String,
    pub status: GatewayPaymentStatus,
    pub amount: MinorUnits,
    pub currency: String,
    /// Raw `data` object as returned by the gateway.
    pub raw: serde_json::Value,
}

/// A hosted-checkout payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short gateway identifier stored on each transaction.
    fn name(&self) -> &'static str;

    /// Open a hosted checkout for a merchant reference.
    async fn initialize(
        &self,
        request: &InitializeRequest,
    ) -> Result<InitializedPayment, GatewayError>;

    /// Look up the settled state of a merchant reference.
    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError>;
}
