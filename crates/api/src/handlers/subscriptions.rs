//! Handlers for `/subscriptions`: checkout, renewal and the customer's
//! view of their plans.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use onenumber_core::audit::{action_types, entity_types};
use onenumber_core::error::CoreError;
use onenumber_core::subscription::{self, CYCLE_MONTHLY, STATUS_CANCELLED};
use onenumber_core::types::DbId;
use onenumber_db::models::subscription::{Subscription, SubscriptionSummary};
use onenumber_db::repositories::SubscriptionRepo;
use serde::Deserialize;

use crate::audit::AuditRecord;
use crate::billing::{self, CheckoutResult, PaymentSession};
use crate::error::AppResult;
use crate::handlers::users::load_user;
use crate::middleware::auth::AuthUser;
use crate::middleware::client_info::ClientInfo;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub phone_number_id: DbId,
    #[serde(default = "default_cycle")]
    pub billing_cycle: String,
    #[serde(default)]
    pub auto_renew: bool,
}

fn default_cycle() -> String {
    CYCLE_MONTHLY.to_string()
}

#[derive(Debug, Deserialize)]
pub struct AutoRenewRequest {
    pub auto_renew: bool,
}

/// POST /api/subscriptions
///
/// Start buying a number. The number is reserved for the caller and the
/// response carries the gateway URL to complete payment.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Json(input): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CheckoutResult>>)> {
    let user = load_user(&state, auth.user_id).await?;
    if !user.is_active {
        return Err(CoreError::Forbidden("Account is deactivated".into()).into());
    }

    let result = billing::checkout(
        &state,
        &user,
        input.phone_number_id,
        input.billing_cycle.trim(),
        input.auto_renew,
        &client,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// GET /api/subscriptions
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<SubscriptionSummary>>>> {
    let subs = SubscriptionRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: subs }))
}

/// GET /api/subscriptions/{id}
pub async fn get_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Subscription>>> {
    let sub = load_visible(&state, &auth, id).await?;
    Ok(Json(DataResponse { data: sub }))
}

/// POST /api/subscriptions/{id}/cancel
///
/// Stop renewing. The customer keeps the number until the current period
/// ends; the expiry sweep then returns it to inventory.
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Subscription>>> {
    let sub = load_visible(&state, &auth, id).await?;
    let cancelled = cancel_subscription(&state, &sub, auth.user_id, &client).await?;
    Ok(Json(DataResponse { data: cancelled }))
}

/// Shared by the customer and admin cancel endpoints.
pub(crate) async fn cancel_subscription(
    state: &AppState,
    sub: &Subscription,
    actor_id: DbId,
    client: &ClientInfo,
) -> AppResult<Subscription> {
    subscription::validate_transition(&sub.status, STATUS_CANCELLED)?;

    let cancelled = SubscriptionRepo::cancel(&state.pool, sub.id)
        .await?
        .ok_or_else(|| CoreError::Conflict("Subscription changed state, try again".into()))?;

    AuditRecord::new(action_types::SUBSCRIPTION_CANCEL)
        .actor(actor_id)
        .entity(entity_types::SUBSCRIPTION, sub.id)
        .details(serde_json::json!({
            "previous_status": sub.status,
            "period_end": cancelled.current_period_end,
        }))
        .client(client)
        .write(&state.pool)
        .await;

    tracing::info!(subscription_id = sub.id, actor_id, "Subscription cancelled");
    Ok(cancelled)
}

/// POST /api/subscriptions/{id}/renew
///
/// Open (or resume) a renewal payment for the next cycle.
pub async fn renew(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PaymentSession>>> {
    let sub = SubscriptionRepo::find_for_user(&state.pool, id, auth.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Subscription",
            id,
        })?;
    let user = load_user(&state, auth.user_id).await?;

    let session = billing::start_renewal(&state, &user, &sub, &client).await?;
    Ok(Json(DataResponse { data: session }))
}

/// PUT /api/subscriptions/{id}/auto-renew
pub async fn set_auto_renew(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<AutoRenewRequest>,
) -> AppResult<Json<DataResponse<Subscription>>> {
    let sub = SubscriptionRepo::find_for_user(&state.pool, id, auth.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Subscription",
            id,
        })?;

    let updated = SubscriptionRepo::set_auto_renew(&state.pool, sub.id, input.auto_renew)
        .await?
        .ok_or_else(|| {
            CoreError::Conflict(format!(
                "Auto-renew cannot be changed on a {} subscription",
                sub.status
            ))
        })?;

    Ok(Json(DataResponse { data: updated }))
}

/// Owners see their own subscriptions, admins see all. Anything else is a
/// 404.
async fn load_visible(state: &AppState, auth: &AuthUser, id: DbId) -> AppResult<Subscription> {
    let found = if auth.is_admin() {
        SubscriptionRepo::find_by_id(&state.pool, id).await?
    } else {
        SubscriptionRepo::find_for_user(&state.pool, id, auth.user_id).await?
    };
    found.ok_or_else(|| {
        CoreError::NotFound {
            entity: "Subscription",
            id,
        }
        .into()
    })
}
