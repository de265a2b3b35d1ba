//! BudPay REST client.
//!
//! Wraps `POST /transaction/initialize` and `GET /transaction/verify/{ref}`
//! using [`reqwest`]. Both endpoints answer with an envelope
//! `{"status": bool, "message": str, "data": {...}}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::gateway::{
    GatewayError, GatewayPaymentStatus, InitializeRequest, InitializedPayment, PaymentGateway,
    VerifiedPayment,
};
use crate::money;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.budpay.com/api/v2";

/// Per-request timeout for gateway calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// BudPay connection settings.
#[derive(Debug, Clone)]
pub struct BudPayConfig {
    pub secret_key: String,
    pub base_url: String,
}

impl BudPayConfig {
    /// Load from environment variables.
    ///
    /// | Env Var             | Required | Default                          |
    /// |---------------------|----------|----------------------------------|
    /// | `BUDPAY_SECRET_KEY` | **yes**  | --                               |
    /// | `BUDPAY_BASE_URL`   | no       | `https://api.budpay.com/api/v2`  |
    ///
    /// # Panics
    ///
    /// Panics if `BUDPAY_SECRET_KEY` is not set or empty.
    pub fn from_env() -> Self {
        let secret_key = std::env::var("BUDPAY_SECRET_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .expect("BUDPAY_SECRET_KEY must be set");
        let base_url = std::env::var("BUDPAY_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self { secret_key, base_url }
    }
}

/// HTTP client for the BudPay API.
pub struct BudPayClient {
    client: reqwest::Client,
    config: BudPayConfig,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    #[serde(default)]
    access_code: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

impl BudPayClient {
    pub fn new(config: BudPayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    /// Reuse an existing [`reqwest::Client`] (tests, shared pools).
    pub fn with_client(client: reqwest::Client, config: BudPayConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    // ---- private helpers ----

    /// Return the response unchanged on 2xx, otherwise an
    /// [`GatewayError::Api`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }

    /// Decode the envelope and unwrap `data`, rejecting `status: false`.
    async fn parse_envelope<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status().as_u16();
        let envelope: Envelope<T> = Self::ensure_success(response).await?.json().await?;
        if !envelope.status {
            return Err(GatewayError::Api {
                status,
                message: envelope
                    .message
                    .unwrap_or_else(|| "gateway reported failure".to_string()),
            });
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("response has no data".into()))
    }
}

#[async_trait]
impl PaymentGateway for BudPayClient {
    fn name(&self) -> &'static str {
        "budpay"
    }

    async fn initialize(
        &self,
        request: &InitializeRequest,
    ) -> Result<InitializedPayment, GatewayError> {
        let body = serde_json::json!({
            "email": request.email,
            "amount": money::to_major_string(request.amount),
            "currency": request.currency,
            "reference": request.reference,
            "callback": request.callback_url,
        });

        let response = self
            .client
            .post(self.url("transaction/initialize"))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await?;

        let data: InitializeData = Self::parse_envelope(response).await?;
        tracing::debug!(reference = %request.reference, "BudPay checkout initialized");

        Ok(InitializedPayment {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference.unwrap_or_else(|| request.reference.clone()),
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("transaction/verify/{reference}")))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        let data: serde_json::Value = Self::parse_envelope(response).await?;

        let status = data
            .get("status")
            .and_then(|s| s.as_str())
            .map(GatewayPaymentStatus::from_gateway)
            .ok_or_else(|| GatewayError::InvalidResponse("verify data has no status".into()))?;
        let amount = data
            .get("amount")
            .ok_or_else(|| GatewayError::InvalidResponse("verify data has no amount".into()))
            .and_then(money::parse_major)?;
        let currency = data
            .get("currency")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_uppercase();
        let gateway_reference = data
            .get("reference")
            .and_then(|r| r.as_str())
            .unwrap_or(reference)
            .to_string();

        if gateway_reference != reference {
            return Err(GatewayError::InvalidResponse(format!(
                "verify returned reference {gateway_reference} for {reference}"
            )));
        }

        Ok(VerifiedPayment {
            reference: gateway_reference,
            status,
            amount,
            currency,
            raw: data,
        })
    }
}
