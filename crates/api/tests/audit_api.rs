//! HTTP-level integration tests for the admin audit log endpoints: query,
//! export and chain integrity.

mod common;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use common::{body_json, body_text, create_user, get_auth, login, post_json, signed_in};
use sqlx::PgPool;

/// Produce a few audit entries: one login per user plus a failed login.
async fn seed_activity(pool: &PgPool, app: &common::TestApp) -> String {
    let (_, admin) = signed_in(pool, app.app(), "Admin", "admin").await;
    let ada = create_user(pool, "Ada", "customer").await;
    login(app.app(), &ada.email).await;
    let body = serde_json::json!({ "email": ada.email, "password": "wrongpass1" });
    post_json(app.app(), "/api/users/login", body).await;
    admin
}

/// Entries can be filtered by action type and user.
#[sqlx::test(migrations = "../../db/migrations")]
async fn query_filters_by_action_type(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = seed_activity(&pool, &app).await;

    let response = get_auth(app.app(), "/api/admin/audit-logs?action_type=login", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 2);
    assert!(json["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["action_type"] == "login"));

    let json = body_json(
        get_auth(app.app(), "/api/admin/audit-logs?action_type=login_failed", &admin).await,
    )
    .await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["details_json"]["failed_attempts"], 1);
}

/// Non-RFC 3339 timestamps are rejected.
#[sqlx::test(migrations = "../../db/migrations")]
async fn query_rejects_bad_timestamp(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (_, admin) = signed_in(&pool, app.app(), "Admin", "admin").await;

    let response = get_auth(app.app(), "/api/admin/audit-logs?from=yesterday", &admin).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// CSV export is an attachment with one row per entry.
#[sqlx::test(migrations = "../../db/migrations")]
async fn export_csv(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = seed_activity(&pool, &app).await;

    let response = get_auth(app.app(), "/api/admin/audit-logs/export?format=csv", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("attachment"));

    let csv = body_text(response).await;
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,timestamp,user_id,action_type"));
    assert_eq!(lines.count(), 3);
}

/// JSON is the default export format; unknown formats and inverted ranges fail.
#[sqlx::test(migrations = "../../db/migrations")]
async fn export_json_and_bad_params(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = seed_activity(&pool, &app).await;

    let json = body_json(get_auth(app.app(), "/api/admin/audit-logs/export", &admin).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 3);

    let response = get_auth(app.app(), "/api/admin/audit-logs/export?format=xml", &admin).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let uri = "/api/admin/audit-logs/export?from=2026-02-01T00:00:00Z&to=2026-01-01T00:00:00Z";
    let response = get_auth(app.app(), uri, &admin).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// The chain verifies until a row is edited behind the application's back.
#[sqlx::test(migrations = "../../db/migrations")]
async fn integrity_check_detects_tampering(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = seed_activity(&pool, &app).await;
    let uri = "/api/admin/audit-logs/integrity-check";

    let json = body_json(get_auth(app.app(), uri, &admin).await).await;
    assert_eq!(json["data"]["chain_valid"], true);
    assert_eq!(json["data"]["verified_entries"], 3);

    let tampered: i64 = sqlx::query_scalar(
        "UPDATE audit_logs SET action_type = 'logout'
         WHERE id = (SELECT MIN(id) FROM audit_logs) RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let json = body_json(get_auth(app.app(), uri, &admin).await).await;
    assert_eq!(json["data"]["chain_valid"], false);
    assert_eq!(json["data"]["first_break"], tampered);
}
