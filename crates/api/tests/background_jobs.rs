//! Integration tests for the reservation sweeper and the subscription
//! expiry job, including a payment that settles after its reservation
//! lapsed.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, create_number, get_auth, post_json_auth, put_json_auth, signed_in, TestApp,
};
use onenumber_api::background::{reservation_sweeper, subscription_expiry};
use onenumber_core::audit::action_types;
use onenumber_db::repositories::{PaymentTransactionRepo, PhoneNumberRepo, SubscriptionRepo};
use onenumber_events::{event_types, EventBus};
use onenumber_payments::GatewayPaymentStatus;
use sqlx::PgPool;

/// Start a checkout and return (subscription id, payment reference).
async fn start_checkout(app: &TestApp, token: &str, number_id: i64) -> (i64, String) {
    let body = serde_json::json!({ "phone_number_id": number_id });
    let response = post_json_auth(app.app(), "/api/subscriptions", body, token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    (
        json["data"]["subscription"]["id"].as_i64().unwrap(),
        json["data"]["payment"]["reference"].as_str().unwrap().to_string(),
    )
}

async fn lapse_reservation(pool: &PgPool, number_id: i64) {
    sqlx::query("UPDATE phone_numbers SET reserved_until = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(number_id)
        .execute(pool)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Reservation sweeper
// ---------------------------------------------------------------------------

/// A lapsed reservation is released with its pending checkout.
#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_releases_lapsed_reservations(pool: PgPool) {
    let lapsed = create_number(&pool, "+2348040000001", 100_000).await;
    let fresh = create_number(&pool, "+2348040000002", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (_, token) = signed_in(&pool, app.app(), "Ada", "customer").await;

    let (sub_id, reference) = start_checkout(&app, &token, lapsed.id).await;
    start_checkout(&app, &token, fresh.id).await;
    lapse_reservation(&pool, lapsed.id).await;

    let outcome = reservation_sweeper::sweep_once(&pool).await.unwrap();
    assert_eq!(outcome.released_numbers, 1);
    assert_eq!(outcome.expired_subscriptions, 1);
    assert_eq!(outcome.abandoned_payments, 1);

    let number = PhoneNumberRepo::find_by_id(&pool, lapsed.id).await.unwrap().unwrap();
    assert_eq!(number.status, "available");
    let number = PhoneNumberRepo::find_by_id(&pool, fresh.id).await.unwrap().unwrap();
    assert_eq!(number.status, "reserved");

    let sub = SubscriptionRepo::find_by_id(&pool, sub_id).await.unwrap().unwrap();
    assert_eq!(sub.status, "expired");
    let tx = PaymentTransactionRepo::find_by_reference(&pool, &reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, "abandoned");

    let again = reservation_sweeper::sweep_once(&pool).await.unwrap();
    assert_eq!(again, reservation_sweeper::SweepOutcome::default());
}

/// A payment that lands after the sweep is kept but flagged for refund, and
/// the number stays in inventory.
#[sqlx::test(migrations = "../../db/migrations")]
async fn late_payment_after_sweep_is_flagged_for_refund(pool: PgPool) {
    let number = create_number(&pool, "+2348040000003", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (_, token) = signed_in(&pool, app.app(), "Ada", "customer").await;

    let (_, reference) = start_checkout(&app, &token, number.id).await;
    lapse_reservation(&pool, number.id).await;
    reservation_sweeper::sweep_once(&pool).await.unwrap();

    // Abandoned is terminal, so put the row back to pending as if the
    // gateway callback raced the sweep.
    sqlx::query("UPDATE payment_transactions SET status = 'pending' WHERE reference = $1")
        .bind(&reference)
        .execute(&pool)
        .await
        .unwrap();

    app.gateway.settle(&reference, GatewayPaymentStatus::Success);
    let uri = format!("/api/payments/verify/{reference}");
    let json = body_json(get_auth(app.app(), &uri, &token).await).await;
    assert_eq!(json["data"]["status"], "success");

    let stored = PhoneNumberRepo::find_by_id(&pool, number.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "available");
    assert_eq!(stored.owner_id, None);

    let flagged: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs
         WHERE action_type = $1 AND details_json->>'requires_refund' = 'true'",
    )
    .bind(action_types::SYSTEM)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(flagged, 1);
}

// ---------------------------------------------------------------------------
// Subscription expiry
// ---------------------------------------------------------------------------

/// Subscriptions past their period end expire and their numbers return to
/// inventory.
#[sqlx::test(migrations = "../../db/migrations")]
async fn expiry_releases_numbers_of_ended_subscriptions(pool: PgPool) {
    let number = create_number(&pool, "+2348040000004", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (_, token) = signed_in(&pool, app.app(), "Ada", "customer").await;

    let (sub_id, reference) = start_checkout(&app, &token, number.id).await;
    app.gateway.settle(&reference, GatewayPaymentStatus::Success);
    let uri = format!("/api/payments/verify/{reference}");
    get_auth(app.app(), &uri, &token).await;

    let bus = EventBus::default();
    let mut events = bus.subscribe();

    let outcome = subscription_expiry::expire_once(&pool, &bus).await.unwrap();
    assert_eq!(outcome.expired_subscriptions, 0, "period has not ended yet");

    sqlx::query(
        "UPDATE subscriptions SET current_period_end = NOW() - INTERVAL '1 day' WHERE id = $1",
    )
    .bind(sub_id)
    .execute(&pool)
    .await
    .unwrap();

    let outcome = subscription_expiry::expire_once(&pool, &bus).await.unwrap();
    assert_eq!(outcome.expired_subscriptions, 1);
    assert_eq!(outcome.released_numbers, 1);

    let sub = SubscriptionRepo::find_by_id(&pool, sub_id).await.unwrap().unwrap();
    assert_eq!(sub.status, "expired");
    let stored = PhoneNumberRepo::find_by_id(&pool, number.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "available");

    let event = events.recv().await.unwrap();
    assert_eq!(event.event_type, event_types::SUBSCRIPTION_EXPIRED);
    assert_eq!(event.payload_str("display_number"), Some(number.display_number.as_str()));
}

/// Suspended numbers are left alone when their subscription ends.
#[sqlx::test(migrations = "../../db/migrations")]
async fn expiry_leaves_suspended_numbers(pool: PgPool) {
    let number = create_number(&pool, "+2348040000005", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (_, token) = signed_in(&pool, app.app(), "Ada", "customer").await;

    let (sub_id, reference) = start_checkout(&app, &token, number.id).await;
    app.gateway.settle(&reference, GatewayPaymentStatus::Success);
    let uri = format!("/api/payments/verify/{reference}");
    get_auth(app.app(), &uri, &token).await;

    PhoneNumberRepo::transition_status(&pool, number.id, "assigned", "suspended")
        .await
        .unwrap()
        .unwrap();
    sqlx::query(
        "UPDATE subscriptions SET current_period_end = NOW() - INTERVAL '1 day' WHERE id = $1",
    )
    .bind(sub_id)
    .execute(&pool)
    .await
    .unwrap();

    let outcome = subscription_expiry::expire_once(&pool, &EventBus::default())
        .await
        .unwrap();
    assert_eq!(outcome.expired_subscriptions, 1);
    assert_eq!(outcome.released_numbers, 0);

    let stored = PhoneNumberRepo::find_by_id(&pool, number.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "suspended");
}

/// A suspended number whose subscription has ended cannot be reinstated;
/// it can only go back to inventory.
#[sqlx::test(migrations = "../../db/migrations")]
async fn ended_suspension_cannot_be_reinstated(pool: PgPool) {
    let number = create_number(&pool, "+2348040000006", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (_, token) = signed_in(&pool, app.app(), "Ada", "customer").await;
    let (_, admin_token) = signed_in(&pool, app.app(), "Root", "admin").await;

    let (sub_id, reference) = start_checkout(&app, &token, number.id).await;
    app.gateway.settle(&reference, GatewayPaymentStatus::Success);
    let uri = format!("/api/payments/verify/{reference}");
    get_auth(app.app(), &uri, &token).await;

    let status_uri = format!("/api/admin/numbers/{}/status", number.id);
    let response = put_json_auth(
        app.app(),
        &status_uri,
        serde_json::json!({ "status": "suspended" }),
        &admin_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    sqlx::query(
        "UPDATE subscriptions SET current_period_end = NOW() - INTERVAL '1 day' WHERE id = $1",
    )
    .bind(sub_id)
    .execute(&pool)
    .await
    .unwrap();
    subscription_expiry::expire_once(&pool, &EventBus::default())
        .await
        .unwrap();

    let response = put_json_auth(
        app.app(),
        &status_uri,
        serde_json::json!({ "status": "assigned" }),
        &admin_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let stored = PhoneNumberRepo::find_by_id(&pool, number.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "suspended");

    // The repository guard holds on its own too.
    let reinstated = PhoneNumberRepo::transition_status(&pool, number.id, "suspended", "assigned")
        .await
        .unwrap();
    assert!(reinstated.is_none());

    let response = put_json_auth(
        app.app(),
        &status_uri,
        serde_json::json!({ "status": "available" }),
        &admin_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = PhoneNumberRepo::find_by_id(&pool, number.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "available");
    assert_eq!(stored.owner_id, None);
}
