//! Payment callback payload parsing.
//!
//! The callback is only a hint: the handler still verifies the reference
//! with the gateway before touching any state, so only the fields needed to
//! route the notification are extracted here.

use serde::Deserialize;

use crate::gateway::GatewayError;

/// `notify` value for card/bank transaction callbacks.
pub const NOTIFY_TRANSACTION: &str = "transaction";

#[derive(Debug, Deserialize)]
struct RawWebhook {
    #[serde(default)]
    notify: Option<String>,
    #[serde(default, rename = "notifyType")]
    notify_type: Option<String>,
    #[serde(default)]
    data: Option<RawWebhookData>,
}

#[derive(Debug, Deserialize)]
struct RawWebhookData {
    #[serde(default)]
    reference: Option<String>,
}

/// A parsed payment callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Callback category, e.g. `transaction` or `payout`.
    pub notify: String,
    /// Gateway outcome hint, e.g. `successful`.
    pub notify_type: Option<String>,
    /// Merchant reference the callback is about.
    pub reference: String,
}

impl WebhookEvent {
    /// Parse a raw callback body.
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        let raw: RawWebhook = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidResponse(format!("webhook body: {e}")))?;

        let reference = raw
            .data
            .and_then(|d| d.reference)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| GatewayError::InvalidResponse("webhook has no reference".into()))?;

        Ok(Self {
            notify: raw.notify.unwrap_or_else(|| NOTIFY_TRANSACTION.to_string()),
            notify_type: raw.notify_type,
            reference,
        })
    }

    /// Only transaction callbacks affect subscriptions.
    pub fn is_transaction(&self) -> bool {
        self.notify.eq_ignore_ascii_case(NOTIFY_TRANSACTION)
    }
}
