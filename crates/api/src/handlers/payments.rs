//! Handlers for `/payments`: verification, the gateway callback and the
//! customer's payment history.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use onenumber_core::error::CoreError;
use onenumber_core::payment::validate_reference;
use onenumber_db::models::payment::PaymentTransaction;
use onenumber_db::repositories::PaymentTransactionRepo;
use onenumber_payments::signature::{verify_webhook_signature, SIGNATURE_HEADER};
use onenumber_payments::webhook::WebhookEvent;
use serde::Serialize;

use crate::billing::{self, FinalizeTrigger};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// GET /api/payments/verify/{reference}
///
/// Called when the customer returns from the hosted checkout. Safe to call
/// repeatedly; a settled payment is returned as stored.
pub async fn verify(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reference): Path<String>,
) -> AppResult<Json<DataResponse<PaymentTransaction>>> {
    validate_reference(&reference)?;

    let tx = PaymentTransactionRepo::find_by_reference(&state.pool, &reference)
        .await?
        .filter(|tx| tx.user_id == auth.user_id || auth.is_admin())
        .ok_or_else(|| AppError::NotFound(format!("Payment {reference} not found")))?;

    let settled = billing::finalize_payment(&state, &tx.reference, FinalizeTrigger::CustomerVerify).await?;
    Ok(Json(DataResponse { data: settled }))
}

/// POST /api/payments/webhook
///
/// Gateway callback. The body must carry a valid `merchantsignature`; its
/// contents only tell us which reference to re-verify, so a forged but
/// correctly signed body still cannot mark anything paid.
///
/// Unknown references are acknowledged so the gateway stops retrying.
/// Gateway errors during verification return 502 so it retries later.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CoreError::Unauthorized("Missing webhook signature".into()))?;

    if !verify_webhook_signature(&state.config.webhook_secret, &body, signature) {
        tracing::warn!("Rejected webhook with invalid signature");
        return Err(CoreError::Unauthorized("Invalid webhook signature".into()).into());
    }

    let event = WebhookEvent::parse(&body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if !event.is_transaction() {
        tracing::debug!(notify = %event.notify, "Ignoring non-transaction webhook");
        return Ok(Json(WebhookAck { received: true }));
    }

    tracing::info!(
        reference = %event.reference,
        notify_type = ?event.notify_type,
        "Payment webhook received"
    );

    match billing::finalize_payment(&state, &event.reference, FinalizeTrigger::Webhook).await {
        Ok(tx) => {
            tracing::debug!(reference = %tx.reference, status = %tx.status, "Webhook processed");
        }
        Err(AppError::NotFound(_)) => {
            tracing::warn!(reference = %event.reference, "Webhook for unknown payment reference");
        }
        Err(e) => return Err(e),
    }

    Ok(Json(WebhookAck { received: true }))
}

/// GET /api/payments
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<PaymentTransaction>>>> {
    let items =
        PaymentTransactionRepo::list_for_user(&state.pool, auth.user_id, page.limit, page.offset)
            .await?;
    Ok(Json(DataResponse { data: items }))
}
