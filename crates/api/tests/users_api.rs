//! HTTP-level integration tests for `/api/users`.
//!
//! Covers registration, login and lockout, token refresh, profile edits,
//! password change, and the email-verification / password-reset flows.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, create_user, get, get_auth, login, post_auth, post_json, put_json_auth, PASSWORD,
};
use onenumber_events::event_types;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Registering creates a customer, normalizes email and phone, and signs the
/// new user in.
#[sqlx::test(migrations = "../../db/migrations")]
async fn register_creates_customer_and_returns_tokens(pool: PgPool) {
    let app = common::build_test_app(pool);

    let body = serde_json::json!({
        "full_name": "Ada Obi",
        "email": "Ada@Example.com",
        "phone": "+234 803 000 0000",
        "password": "goodpass1",
    });
    let response = post_json(app.app(), "/api/users/register", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["expires_in"], 3600);
    assert_eq!(json["user"]["email"], "ada@example.com");
    assert_eq!(json["user"]["phone"], "+2348030000000");
    assert_eq!(json["user"]["role"], "customer");
    assert_eq!(json["user"]["email_verified"], false);
}

/// A second registration with the same email (any case) is a conflict.
#[sqlx::test(migrations = "../../db/migrations")]
async fn register_duplicate_email_returns_409(pool: PgPool) {
    create_user(&pool, "Ada", "customer").await;
    let app = common::build_test_app(pool);

    let body = serde_json::json!({
        "full_name": "Another Ada",
        "email": "ADA@example.com",
        "password": "goodpass1",
    });
    let response = post_json(app.app(), "/api/users/register", body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

/// Weak passwords and malformed emails are rejected before anything is stored.
#[sqlx::test(migrations = "../../db/migrations")]
async fn register_rejects_invalid_input(pool: PgPool) {
    let app = common::build_test_app(pool);

    let weak = serde_json::json!({
        "full_name": "Ada Obi",
        "email": "ada@example.com",
        "password": "short",
    });
    let response = post_json(app.app(), "/api/users/register", weak).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let bad_email = serde_json::json!({
        "full_name": "Ada Obi",
        "email": "not-an-email",
        "password": "goodpass1",
    });
    let response = post_json(app.app(), "/api/users/register", bad_email).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Login and sessions
// ---------------------------------------------------------------------------

/// Wrong password and unknown email produce the same 401.
#[sqlx::test(migrations = "../../db/migrations")]
async fn login_failures_are_indistinguishable(pool: PgPool) {
    create_user(&pool, "Bola", "customer").await;
    let app = common::build_test_app(pool);

    let wrong = serde_json::json!({ "email": "bola@example.com", "password": "wrongpass1" });
    let response = post_json(app.app(), "/api/users/login", wrong).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let wrong_json = body_json(response).await;

    let unknown = serde_json::json!({ "email": "nobody@example.com", "password": "wrongpass1" });
    let response = post_json(app.app(), "/api/users/login", unknown).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let unknown_json = body_json(response).await;

    assert_eq!(wrong_json["error"], unknown_json["error"]);
}

/// Five failed attempts lock the account; the right password is then refused.
#[sqlx::test(migrations = "../../db/migrations")]
async fn repeated_failures_lock_account(pool: PgPool) {
    create_user(&pool, "Chidi", "customer").await;
    let app = common::build_test_app(pool);

    let wrong = serde_json::json!({ "email": "chidi@example.com", "password": "wrongpass1" });
    for _ in 0..5 {
        let response = post_json(app.app(), "/api/users/login", wrong.clone()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let right = serde_json::json!({ "email": "chidi@example.com", "password": PASSWORD });
    let response = post_json(app.app(), "/api/users/login", right).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// Once a lock lapses, a single typo is an ordinary failure rather than an
/// immediate new lock.
#[sqlx::test(migrations = "../../db/migrations")]
async fn lapsed_lock_starts_a_fresh_count(pool: PgPool) {
    let user = create_user(&pool, "Efe", "customer").await;
    let app = common::build_test_app(pool.clone());

    let wrong = serde_json::json!({ "email": "efe@example.com", "password": "wrongpass1" });
    for _ in 0..5 {
        post_json(app.app(), "/api/users/login", wrong.clone()).await;
    }
    let (count, locked) = sqlx::query_as::<_, (i32, bool)>(
        "SELECT failed_login_count, locked_until IS NOT NULL FROM users WHERE id = $1",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 0);
    assert!(locked);

    sqlx::query("UPDATE users SET locked_until = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();

    let response = post_json(app.app(), "/api/users/login", wrong.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let right = serde_json::json!({ "email": "efe@example.com", "password": PASSWORD });
    let response = post_json(app.app(), "/api/users/login", right).await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// A refresh token can be used once; replaying it is rejected.
#[sqlx::test(migrations = "../../db/migrations")]
async fn refresh_rotates_tokens(pool: PgPool) {
    create_user(&pool, "Dayo", "customer").await;
    let app = common::build_test_app(pool);

    let body = serde_json::json!({ "email": "dayo@example.com", "password": PASSWORD });
    let json = body_json(post_json(app.app(), "/api/users/login", body).await).await;
    let refresh_token = json["refresh_token"].as_str().unwrap().to_string();

    let body = serde_json::json!({ "refresh_token": refresh_token });
    let response = post_json(app.app(), "/api/users/refresh", body.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    assert_ne!(rotated["refresh_token"], json["refresh_token"]);

    let response = post_json(app.app(), "/api/users/refresh", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Logout revokes every refresh token of the caller.
#[sqlx::test(migrations = "../../db/migrations")]
async fn logout_revokes_sessions(pool: PgPool) {
    create_user(&pool, "Efe", "customer").await;
    let app = common::build_test_app(pool);

    let body = serde_json::json!({ "email": "efe@example.com", "password": PASSWORD });
    let json = body_json(post_json(app.app(), "/api/users/login", body).await).await;
    let access = json["access_token"].as_str().unwrap();

    let response = post_auth(app.app(), "/api/users/logout", access).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = serde_json::json!({ "refresh_token": json["refresh_token"] });
    let response = post_json(app.app(), "/api/users/refresh", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Deactivated accounts cannot sign in.
#[sqlx::test(migrations = "../../db/migrations")]
async fn deactivated_user_cannot_login(pool: PgPool) {
    let user = create_user(&pool, "Funmi", "customer").await;
    onenumber_db::repositories::UserRepo::deactivate(&pool, user.id)
        .await
        .unwrap();
    let app = common::build_test_app(pool);

    let body = serde_json::json!({ "email": "funmi@example.com", "password": PASSWORD });
    let response = post_json(app.app(), "/api/users/login", body).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Profile and password
// ---------------------------------------------------------------------------

/// Profile endpoints require a bearer token.
#[sqlx::test(migrations = "../../db/migrations")]
async fn profile_requires_auth(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.app(), "/api/users/profile").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_auth(app.app(), "/api/users/profile", "garbage").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Profile updates normalize the contact phone.
#[sqlx::test(migrations = "../../db/migrations")]
async fn update_profile_changes_name_and_phone(pool: PgPool) {
    create_user(&pool, "Gozie", "customer").await;
    let app = common::build_test_app(pool);
    let token = login(app.app(), "gozie@example.com").await;

    let body = serde_json::json!({ "full_name": "Gozie Eze", "phone": "+1 (800) 555-0199" });
    let response = put_json_auth(app.app(), "/api/users/profile", body, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["full_name"], "Gozie Eze");
    assert_eq!(json["data"]["phone"], "+18005550199");

    let response = get_auth(app.app(), "/api/users/profile", &token).await;
    assert_eq!(body_json(response).await["data"]["full_name"], "Gozie Eze");
}

/// Changing the password needs the current one and takes effect for login.
#[sqlx::test(migrations = "../../db/migrations")]
async fn change_password_flow(pool: PgPool) {
    create_user(&pool, "Halima", "customer").await;
    let app = common::build_test_app(pool);
    let token = login(app.app(), "halima@example.com").await;

    let body = serde_json::json!({ "current_password": "wrongpass1", "new_password": "newpass99" });
    let response = put_json_auth(app.app(), "/api/users/password", body, &token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = serde_json::json!({ "current_password": PASSWORD, "new_password": "newpass99" });
    let response = put_json_auth(app.app(), "/api/users/password", body, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = serde_json::json!({ "email": "halima@example.com", "password": "newpass99" });
    let response = post_json(app.app(), "/api/users/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Token flows
// ---------------------------------------------------------------------------

/// The token emitted on registration verifies the email exactly once.
#[sqlx::test(migrations = "../../db/migrations")]
async fn verify_email_with_registration_token(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut events = app.event_bus.subscribe();

    let body = serde_json::json!({
        "full_name": "Ifeoma Nwosu",
        "email": "ifeoma@example.com",
        "password": "goodpass1",
    });
    let response = post_json(app.app(), "/api/users/register", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let event = events.recv().await.unwrap();
    assert_eq!(event.event_type, event_types::USER_REGISTERED);
    let token = event.payload_str("verification_token").unwrap().to_string();

    let body = serde_json::json!({ "token": token });
    let response = post_json(app.app(), "/api/users/verify-email", body.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["email_verified"], true);

    let response = post_json(app.app(), "/api/users/verify-email", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Forgot-password answers 202 for unknown emails too, and the emitted reset
/// token sets a new password.
#[sqlx::test(migrations = "../../db/migrations")]
async fn password_reset_flow(pool: PgPool) {
    create_user(&pool, "Jide", "customer").await;
    let app = common::build_test_app(pool);
    let mut events = app.event_bus.subscribe();

    let body = serde_json::json!({ "email": "ghost@example.com" });
    let response = post_json(app.app(), "/api/users/forgot-password", body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = serde_json::json!({ "email": "jide@example.com" });
    let response = post_json(app.app(), "/api/users/forgot-password", body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let event = events.recv().await.unwrap();
    assert_eq!(event.event_type, event_types::USER_PASSWORD_RESET_REQUESTED);
    let token = event.payload_str("reset_token").unwrap().to_string();

    let body = serde_json::json!({ "token": token, "new_password": "resetpass7" });
    let response = post_json(app.app(), "/api/users/reset-password", body).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = serde_json::json!({ "email": "jide@example.com", "password": "resetpass7" });
    let response = post_json(app.app(), "/api/users/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Resending verification to an already verified account is a conflict.
#[sqlx::test(migrations = "../../db/migrations")]
async fn resend_verification_after_verified_is_conflict(pool: PgPool) {
    let user = create_user(&pool, "Kemi", "customer").await;
    onenumber_db::repositories::UserRepo::mark_email_verified(&pool, user.id)
        .await
        .unwrap();
    let app = common::build_test_app(pool);
    let token = login(app.app(), "kemi@example.com").await;

    let response = post_auth(app.app(), "/api/users/resend-verification", &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
