//! Checkout, renewal and payment finalization.
//!
//! These flows span several repositories and the payment gateway, so they
//! live here rather than in a single handler. Finalization is shared by the
//! customer-facing verify endpoint and the gateway callback; it may run any
//! number of times for the same reference and applies its effects once.

use chrono::{Duration, Utc};
use onenumber_core::audit::{action_types, entity_types};
use onenumber_core::error::CoreError;
use onenumber_core::payment::{self, PURPOSE_NEW_SUBSCRIPTION, PURPOSE_RENEWAL, REFERENCE_PREFIX};
use onenumber_core::phone_number::STATUS_AVAILABLE;
use onenumber_core::subscription;
use onenumber_core::types::{DbId, MinorUnits, Timestamp};
use onenumber_db::models::payment::{CreatePaymentTransaction, PaymentTransaction};
use onenumber_db::models::phone_number::{InventoryReturn, PhoneNumber};
use onenumber_db::models::subscription::{CreateSubscription, Subscription};
use onenumber_db::models::user::User;
use onenumber_db::repositories::{PaymentTransactionRepo, PhoneNumberRepo, SubscriptionRepo};
use onenumber_events::{event_types, PlatformEvent};
use onenumber_payments::{GatewayPaymentStatus, InitializeRequest, VerifiedPayment};
use serde::Serialize;

use crate::audit::AuditRecord;
use crate::error::{AppError, AppResult};
use crate::middleware::client_info::ClientInfo;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where the customer goes to pay.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub reference: String,
    pub authorization_url: String,
    pub amount: MinorUnits,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResult {
    pub subscription: Subscription,
    pub payment: PaymentSession,
    /// The number is held for the customer until this instant.
    pub reserved_until: Option<Timestamp>,
}

/// Who asked for a payment to be finalized. Recorded in audit details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeTrigger {
    CustomerVerify,
    Webhook,
}

impl FinalizeTrigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::CustomerVerify => "verify",
            Self::Webhook => "webhook",
        }
    }
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// Reserve a number, open a pending subscription and transaction, and start
/// a hosted payment.
///
/// If the gateway refuses, everything created here is rolled back: the
/// transaction is marked failed, the subscription expired and the number
/// released.
pub async fn checkout(
    state: &AppState,
    user: &User,
    phone_number_id: DbId,
    billing_cycle: &str,
    auto_renew: bool,
    client: &ClientInfo,
) -> AppResult<CheckoutResult> {
    subscription::cycle_terms(billing_cycle)?;

    let number = PhoneNumberRepo::find_by_id(&state.pool, phone_number_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "PhoneNumber",
            id: phone_number_id,
        })?;
    if number.status != STATUS_AVAILABLE {
        return Err(CoreError::Conflict("Number is not available".into()).into());
    }

    let amount = subscription::compute_amount(number.monthly_price, billing_cycle)?;
    let until = Utc::now() + Duration::minutes(state.config.reservation_ttl_mins);

    let reserved = PhoneNumberRepo::reserve(&state.pool, number.id, user.id, until)
        .await?
        .ok_or_else(|| CoreError::Conflict("Number was just taken by another customer".into()))?;

    let sub = match SubscriptionRepo::create(
        &state.pool,
        &CreateSubscription {
            user_id: user.id,
            phone_number_id: reserved.id,
            billing_cycle: billing_cycle.to_string(),
            amount,
            currency: reserved.currency.clone(),
            auto_renew,
        },
    )
    .await
    {
        Ok(sub) => sub,
        Err(e) => {
            release_reservation(state, &reserved, user.id).await;
            return Err(e.into());
        }
    };

    let tx = match PaymentTransactionRepo::create(
        &state.pool,
        &new_transaction(state, user.id, &sub, amount, PURPOSE_NEW_SUBSCRIPTION),
    )
    .await
    {
        Ok(tx) => tx,
        Err(e) => {
            abandon_checkout(state, &reserved, &sub, None).await;
            return Err(e.into());
        }
    };

    let session = match start_gateway_payment(state, user, &tx).await {
        Ok(session) => session,
        Err(e) => {
            abandon_checkout(state, &reserved, &sub, Some(&tx)).await;
            return Err(e);
        }
    };

    AuditRecord::new(action_types::NUMBER_RESERVE)
        .actor(user.id)
        .entity(entity_types::PHONE_NUMBER, reserved.id)
        .details(serde_json::json!({ "reserved_until": reserved.reserved_until }))
        .client(client)
        .write(&state.pool)
        .await;
    AuditRecord::new(action_types::SUBSCRIPTION_CREATE)
        .actor(user.id)
        .entity(entity_types::SUBSCRIPTION, sub.id)
        .details(serde_json::json!({
            "phone_number_id": reserved.id,
            "billing_cycle": sub.billing_cycle,
            "amount": sub.amount,
            "reference": tx.reference,
        }))
        .client(client)
        .write(&state.pool)
        .await;

    tracing::info!(
        user_id = user.id,
        phone_number_id = reserved.id,
        subscription_id = sub.id,
        reference = %tx.reference,
        "Checkout started"
    );

    Ok(CheckoutResult {
        subscription: sub,
        payment: session,
        reserved_until: reserved.reserved_until,
    })
}

/// Start (or resume) a renewal payment for a live subscription.
///
/// An unfinished renewal for the same subscription is reused instead of
/// opening a second one.
pub async fn start_renewal(
    state: &AppState,
    user: &User,
    sub: &Subscription,
    client: &ClientInfo,
) -> AppResult<PaymentSession> {
    if !subscription::is_renewable(&sub.status) {
        return Err(CoreError::Conflict(format!(
            "A {} subscription cannot be renewed",
            sub.status
        ))
        .into());
    }

    if let Some(existing) =
        PaymentTransactionRepo::find_pending_for_subscription(&state.pool, sub.id, PURPOSE_RENEWAL)
            .await?
    {
        if let Some(url) = existing.authorization_url.clone() {
            return Ok(PaymentSession {
                reference: existing.reference,
                authorization_url: url,
                amount: existing.amount,
                currency: existing.currency,
            });
        }
    }

    let tx = PaymentTransactionRepo::create(
        &state.pool,
        &new_transaction(state, user.id, sub, sub.amount, PURPOSE_RENEWAL),
    )
    .await?;

    let session = match start_gateway_payment(state, user, &tx).await {
        Ok(session) => session,
        Err(e) => {
            mark_failed_quietly(state, &tx).await;
            return Err(e);
        }
    };

    AuditRecord::new(action_types::SUBSCRIPTION_RENEW)
        .actor(user.id)
        .entity(entity_types::SUBSCRIPTION, sub.id)
        .details(serde_json::json!({ "reference": tx.reference, "stage": "initiated" }))
        .client(client)
        .write(&state.pool)
        .await;

    Ok(session)
}

fn new_transaction(
    state: &AppState,
    user_id: DbId,
    sub: &Subscription,
    amount: MinorUnits,
    purpose: &str,
) -> CreatePaymentTransaction {
    CreatePaymentTransaction {
        user_id,
        subscription_id: sub.id,
        reference: payment::generate_reference(REFERENCE_PREFIX, Utc::now()),
        gateway: state.gateway.name().to_string(),
        amount,
        currency: sub.currency.clone(),
        purpose: purpose.to_string(),
    }
}

async fn start_gateway_payment(
    state: &AppState,
    user: &User,
    tx: &PaymentTransaction,
) -> AppResult<PaymentSession> {
    let initialized = state
        .gateway
        .initialize(&InitializeRequest {
            email: user.email.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            reference: tx.reference.clone(),
            callback_url: state.config.payment_callback_url.clone(),
        })
        .await?;

    PaymentTransactionRepo::set_authorization_url(&state.pool, tx.id, &initialized.authorization_url)
        .await?;

    Ok(PaymentSession {
        reference: tx.reference.clone(),
        authorization_url: initialized.authorization_url,
        amount: tx.amount,
        currency: tx.currency.clone(),
    })
}

/// Undo a checkout that could not reach the gateway. Best-effort: each
/// step logs its own failure.
async fn abandon_checkout(
    state: &AppState,
    number: &PhoneNumber,
    sub: &Subscription,
    tx: Option<&PaymentTransaction>,
) {
    if let Some(tx) = tx {
        mark_failed_quietly(state, tx).await;
    }
    if let Err(e) = SubscriptionRepo::expire_pending(&state.pool, sub.id).await {
        tracing::error!(error = %e, subscription_id = sub.id, "Failed to expire abandoned checkout");
    }
    release_reservation(state, number, sub.user_id).await;
}

async fn mark_failed_quietly(state: &AppState, tx: &PaymentTransaction) {
    if let Err(e) = PaymentTransactionRepo::mark_failed(&state.pool, tx.id, None).await {
        tracing::error!(error = %e, reference = %tx.reference, "Failed to mark transaction failed");
    }
}

async fn release_reservation(state: &AppState, number: &PhoneNumber, user_id: DbId) {
    match PhoneNumberRepo::release_held_by(&state.pool, number.id, user_id).await {
        Ok(Some(_)) => tracing::debug!(phone_number_id = number.id, "Reservation released"),
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, phone_number_id = number.id, "Failed to release reservation")
        }
    }
}

// ---------------------------------------------------------------------------
// Finalization
// ---------------------------------------------------------------------------

/// Settle a transaction against the gateway's view of it.
///
/// Terminal transactions are returned unchanged. A pending one is verified
/// with the gateway and then marked success or failed, or left pending if
/// the gateway has not settled it yet.
pub async fn finalize_payment(
    state: &AppState,
    reference: &str,
    trigger: FinalizeTrigger,
) -> AppResult<PaymentTransaction> {
    let tx = PaymentTransactionRepo::find_by_reference(&state.pool, reference)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment {reference} not found")))?;

    if payment::is_terminal(&tx.status) {
        return Ok(tx);
    }

    let verified = state.gateway.verify(reference).await?;

    match verified.status {
        GatewayPaymentStatus::Pending => {
            tracing::debug!(reference, "Payment still pending at the gateway");
            Ok(tx)
        }
        GatewayPaymentStatus::Failed => {
            settle_failure(state, tx, &verified, "the payment was declined", trigger).await
        }
        GatewayPaymentStatus::Success => {
            if verified.amount != tx.amount || !verified.currency.eq_ignore_ascii_case(&tx.currency)
            {
                tracing::warn!(
                    reference,
                    expected_amount = tx.amount,
                    paid_amount = verified.amount,
                    expected_currency = %tx.currency,
                    paid_currency = %verified.currency,
                    "Gateway amount does not match the transaction"
                );
                return settle_failure(
                    state,
                    tx,
                    &verified,
                    "the amount paid does not match the amount due",
                    trigger,
                )
                .await;
            }
            settle_success(state, tx, &verified, trigger).await
        }
    }
}

async fn settle_failure(
    state: &AppState,
    tx: PaymentTransaction,
    verified: &VerifiedPayment,
    reason: &str,
    trigger: FinalizeTrigger,
) -> AppResult<PaymentTransaction> {
    let Some(failed) =
        PaymentTransactionRepo::mark_failed(&state.pool, tx.id, Some(&verified.raw)).await?
    else {
        return reload(state, &tx).await;
    };

    match failed.purpose.as_str() {
        PURPOSE_NEW_SUBSCRIPTION => {
            if let Some(sub) = SubscriptionRepo::expire_pending(&state.pool, failed.subscription_id).await? {
                if let Some(number) = PhoneNumberRepo::find_by_id(&state.pool, sub.phone_number_id).await? {
                    release_reservation(state, &number, failed.user_id).await;
                }
            }
        }
        PURPOSE_RENEWAL => {
            SubscriptionRepo::mark_past_due(&state.pool, failed.subscription_id).await?;
        }
        other => tracing::warn!(purpose = other, "Unknown payment purpose"),
    }

    AuditRecord::new(action_types::PAYMENT_FAILED)
        .actor(failed.user_id)
        .entity(entity_types::PAYMENT, failed.id)
        .details(serde_json::json!({
            "reference": failed.reference,
            "reason": reason,
            "trigger": trigger.as_str(),
        }))
        .write(&state.pool)
        .await;

    state.event_bus.publish(
        PlatformEvent::new(event_types::PAYMENT_FAILED)
            .with_source(entity_types::PAYMENT, failed.id)
            .with_actor(failed.user_id)
            .with_payload(serde_json::json!({
                "reference": failed.reference,
                "reason": reason,
            })),
    );

    tracing::info!(reference = %failed.reference, reason, "Payment failed");
    Ok(failed)
}

async fn settle_success(
    state: &AppState,
    tx: PaymentTransaction,
    verified: &VerifiedPayment,
    trigger: FinalizeTrigger,
) -> AppResult<PaymentTransaction> {
    // Only one caller wins the pending -> success transition; the others
    // see the stored row and do nothing further.
    let Some(paid) =
        PaymentTransactionRepo::mark_success(&state.pool, tx.id, &verified.raw).await?
    else {
        return reload(state, &tx).await;
    };

    let activated = match paid.purpose.as_str() {
        PURPOSE_NEW_SUBSCRIPTION => activate_new_subscription(state, &paid).await?,
        PURPOSE_RENEWAL => apply_renewal(state, &paid).await?,
        other => {
            tracing::warn!(purpose = other, "Unknown payment purpose");
            None
        }
    };

    AuditRecord::new(action_types::PAYMENT_SUCCESS)
        .actor(paid.user_id)
        .entity(entity_types::PAYMENT, paid.id)
        .details(serde_json::json!({
            "reference": paid.reference,
            "amount": paid.amount,
            "currency": paid.currency,
            "purpose": paid.purpose,
            "applied": activated.is_some(),
            "trigger": trigger.as_str(),
        }))
        .write(&state.pool)
        .await;

    let display_number = match &activated {
        Some((_, number)) => Some(number.display_number.clone()),
        None => None,
    };
    state.event_bus.publish(
        PlatformEvent::new(event_types::PAYMENT_SUCCEEDED)
            .with_source(entity_types::PAYMENT, paid.id)
            .with_actor(paid.user_id)
            .with_payload(serde_json::json!({
                "reference": paid.reference,
                "amount": paid.amount,
                "currency": paid.currency,
                "display_number": display_number,
            })),
    );

    if let Some((sub, number)) = activated {
        state.event_bus.publish(
            PlatformEvent::new(event_types::SUBSCRIPTION_ACTIVATED)
                .with_source(entity_types::SUBSCRIPTION, sub.id)
                .with_actor(sub.user_id)
                .with_payload(serde_json::json!({
                    "display_number": number.display_number,
                    "period_end": sub.current_period_end,
                    "billing_cycle": sub.billing_cycle,
                })),
        );
    }

    tracing::info!(
        reference = %paid.reference,
        amount = paid.amount,
        purpose = %paid.purpose,
        "Payment succeeded"
    );
    Ok(paid)
}

/// Assign the reserved number and start the first billing period.
///
/// Returns `None` when the reservation was lost before the payment settled
/// (the sweeper released the number). The payment stays recorded as
/// successful and is flagged for manual refund.
async fn activate_new_subscription(
    state: &AppState,
    paid: &PaymentTransaction,
) -> AppResult<Option<(Subscription, PhoneNumber)>> {
    let sub = SubscriptionRepo::find_by_id(&state.pool, paid.subscription_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Subscription",
            id: paid.subscription_id,
        })?;

    let Some(number) = PhoneNumberRepo::assign(&state.pool, sub.phone_number_id, paid.user_id).await? else {
        flag_for_refund(state, paid, "number reservation was lost before payment settled").await;
        return Ok(None);
    };

    let start = Utc::now();
    let end = subscription::period_end(start, &sub.billing_cycle)?;
    let Some(active) = SubscriptionRepo::activate(&state.pool, sub.id, start, end).await? else {
        // The subscription moved on (expired by the sweeper); hand the
        // number back rather than leave it assigned without a subscription.
        release_reservation(state, &number, paid.user_id).await;
        flag_for_refund(state, paid, "subscription was no longer pending").await;
        return Ok(None);
    };

    AuditRecord::new(action_types::NUMBER_ASSIGN)
        .actor(paid.user_id)
        .entity(entity_types::PHONE_NUMBER, number.id)
        .details(serde_json::json!({ "subscription_id": active.id }))
        .write(&state.pool)
        .await;

    Ok(Some((active, number)))
}

/// Extend the subscription by one cycle from `max(current_end, now)`.
async fn apply_renewal(
    state: &AppState,
    paid: &PaymentTransaction,
) -> AppResult<Option<(Subscription, PhoneNumber)>> {
    let sub = SubscriptionRepo::find_by_id(&state.pool, paid.subscription_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Subscription",
            id: paid.subscription_id,
        })?;

    let start = subscription::renewal_start(sub.current_period_end, Utc::now());
    let end = subscription::period_end(start, &sub.billing_cycle)?;

    let Some(renewed) = SubscriptionRepo::extend_period(&state.pool, sub.id, start, end).await? else {
        flag_for_refund(state, paid, "subscription was no longer renewable").await;
        return Ok(None);
    };

    AuditRecord::new(action_types::SUBSCRIPTION_RENEW)
        .actor(paid.user_id)
        .entity(entity_types::SUBSCRIPTION, renewed.id)
        .details(serde_json::json!({
            "reference": paid.reference,
            "stage": "paid",
            "period_end": renewed.current_period_end,
        }))
        .write(&state.pool)
        .await;

    let number = PhoneNumberRepo::find_by_id(&state.pool, renewed.phone_number_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "PhoneNumber",
            id: renewed.phone_number_id,
        })?;

    Ok(Some((renewed, number)))
}

async fn flag_for_refund(state: &AppState, paid: &PaymentTransaction, reason: &str) {
    tracing::error!(
        reference = %paid.reference,
        subscription_id = paid.subscription_id,
        reason,
        "Payment succeeded but could not be applied; refund required"
    );
    AuditRecord::new(action_types::SYSTEM)
        .actor(paid.user_id)
        .entity(entity_types::PAYMENT, paid.id)
        .details(serde_json::json!({
            "reference": paid.reference,
            "requires_refund": true,
            "reason": reason,
        }))
        .write(&state.pool)
        .await;
}

async fn reload(state: &AppState, tx: &PaymentTransaction) -> AppResult<PaymentTransaction> {
    PaymentTransactionRepo::find_by_reference(&state.pool, &tx.reference)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", tx.reference)))
}

// ---------------------------------------------------------------------------
// Returning numbers to inventory
// ---------------------------------------------------------------------------

/// Move `number` to `target` (`available` or `retired`), ending whatever
/// subscription holds or is buying it in the same transaction.
///
/// `owner` additionally requires the number to still belong to that user.
/// Returns `None` when the number changed concurrently.
pub async fn return_to_inventory(
    state: &AppState,
    number: &PhoneNumber,
    target: &str,
    owner: Option<DbId>,
) -> AppResult<Option<InventoryReturn>> {
    let Some(returned) =
        PhoneNumberRepo::return_to_inventory(&state.pool, number.id, &number.status, target, owner)
            .await?
    else {
        return Ok(None);
    };

    if let Some(sub) = &returned.ended_subscription {
        tracing::info!(subscription_id = sub.id, phone_number_id = number.id, "Subscription ended with number");
        AuditRecord::new(action_types::SUBSCRIPTION_EXPIRE)
            .actor(sub.user_id)
            .entity(entity_types::SUBSCRIPTION, sub.id)
            .details(serde_json::json!({
                "reason": "number_released",
                "abandoned_payments": returned.abandoned_payments,
            }))
            .write(&state.pool)
            .await;
    }
    if let Some(checkout) = &returned.abandoned_checkout {
        tracing::info!(subscription_id = checkout.id, phone_number_id = number.id, "Checkout abandoned with number");
    }

    Ok(Some(returned))
}
