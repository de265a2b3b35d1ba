//! HTTP-level integration tests for the public catalogue and a customer's
//! own numbers under `/api/numbers`.

mod common;

use axum::http::StatusCode;
use common::{body_json, create_number, get, get_auth, post_auth, signed_in};
use onenumber_core::phone_number::{STATUS_ASSIGNED, STATUS_AVAILABLE};
use onenumber_db::models::phone_number::CreatePhoneNumber;
use onenumber_db::repositories::PhoneNumberRepo;
use sqlx::PgPool;

/// Reserve then assign a number to `user_id`, skipping checkout.
async fn give_number(pool: &PgPool, id: i64, user_id: i64) {
    let until = chrono::Utc::now() + chrono::Duration::minutes(15);
    PhoneNumberRepo::reserve(pool, id, user_id, until)
        .await
        .unwrap()
        .expect("number should be reservable");
    PhoneNumberRepo::assign(pool, id, user_id)
        .await
        .unwrap()
        .expect("reservation should be assignable");
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Search lists only available numbers, cheapest first, without holder data.
#[sqlx::test(migrations = "../../db/migrations")]
async fn search_lists_available_numbers_only(pool: PgPool) {
    let cheap = create_number(&pool, "+2348010000001", 100_000).await;
    let dear = create_number(&pool, "+2348010000002", 250_000).await;
    let taken = create_number(&pool, "+2348010000003", 50_000).await;
    let app = common::build_test_app(pool.clone());
    let (owner, _) = signed_in(&pool, app.app(), "Owner", "customer").await;
    give_number(&pool, taken.id, owner.id).await;

    let response = get(app.app(), "/api/numbers").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["data"]["total"], 2);
    let items = json["data"]["items"].as_array().unwrap();
    assert_eq!(items[0]["id"], cheap.id);
    assert_eq!(items[1]["id"], dear.id);
    assert!(items[0].get("owner_id").is_none(), "listing must not expose holders");
}

/// `contains` accepts vanity letters and matches their keypad digits.
#[sqlx::test(migrations = "../../db/migrations")]
async fn search_contains_translates_vanity_letters(pool: PgPool) {
    let flowers = PhoneNumberRepo::create(
        &pool,
        &CreatePhoneNumber {
            number: "+18003569377".to_string(),
            display_number: onenumber_core::phone_number::format_display("+18003569377", "1"),
            country_code: "1".to_string(),
            number_type: "vanity".to_string(),
            vanity_text: Some("FLOWERS".to_string()),
            monthly_price: 500_000,
            currency: "USD".to_string(),
        },
    )
    .await
    .unwrap();
    create_number(&pool, "+2348010000001", 100_000).await;
    let app = common::build_test_app(pool);

    let response = get(app.app(), "/api/numbers?contains=flowers").await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["id"], flowers.id);

    let response = get(app.app(), "/api/numbers?country_code=%2B1").await;
    assert_eq!(body_json(response).await["data"]["total"], 1);

    let response = get(app.app(), "/api/numbers?max_price=200000").await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["country_code"], "234");
}

/// Letters match stored vanity text even when the keypad digits do not
/// appear in the number, and digit searches tolerate separators.
#[sqlx::test(migrations = "../../db/migrations")]
async fn search_matches_vanity_text_and_separated_digits(pool: PgPool) {
    let pizza = PhoneNumberRepo::create(
        &pool,
        &CreatePhoneNumber {
            number: "+18005550199".to_string(),
            display_number: onenumber_core::phone_number::format_display("+18005550199", "1"),
            country_code: "1".to_string(),
            number_type: "vanity".to_string(),
            vanity_text: Some("PIZZA".to_string()),
            monthly_price: 400_000,
            currency: "USD".to_string(),
        },
    )
    .await
    .unwrap();
    create_number(&pool, "+2348010000001", 100_000).await;
    let app = common::build_test_app(pool);

    let response = get(app.app(), "/api/numbers?contains=pizza").await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["id"], pizza.id);

    let response = get(app.app(), "/api/numbers?contains=800%20555").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["id"], pizza.id);

    let response = get(app.app(), "/api/numbers?contains=%28800%29%20555.0199").await;
    assert_eq!(body_json(response).await["data"]["total"], 1);
}

/// Unknown number types and non-keypad characters are validation errors.
#[sqlx::test(migrations = "../../db/migrations")]
async fn search_rejects_bad_filters(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = get(app.app(), "/api/numbers?number_type=satellite").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(app.app(), "/api/numbers?contains=80%2A1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Detail visibility
// ---------------------------------------------------------------------------

/// Held numbers are hidden from strangers but visible to owner and admin.
#[sqlx::test(migrations = "../../db/migrations")]
async fn held_number_visible_to_owner_and_admin_only(pool: PgPool) {
    let number = create_number(&pool, "+2348010000009", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (owner, owner_token) = signed_in(&pool, app.app(), "Owner", "customer").await;
    let (_, stranger_token) = signed_in(&pool, app.app(), "Stranger", "customer").await;
    let (_, admin_token) = signed_in(&pool, app.app(), "Admin", "admin").await;

    let uri = format!("/api/numbers/{}", number.id);
    let response = get(app.app(), &uri).await;
    assert_eq!(response.status(), StatusCode::OK, "available numbers are public");

    give_number(&pool, number.id, owner.id).await;

    assert_eq!(get(app.app(), &uri).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        get_auth(app.app(), &uri, &stranger_token).await.status(),
        StatusCode::NOT_FOUND
    );

    let response = get_auth(app.app(), &uri, &owner_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], STATUS_ASSIGNED);

    let response = get_auth(app.app(), &uri, &admin_token).await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// A customer sees exactly the numbers they own.
#[sqlx::test(migrations = "../../db/migrations")]
async fn list_mine_returns_owned_numbers(pool: PgPool) {
    let mine = create_number(&pool, "+2348010000011", 100_000).await;
    create_number(&pool, "+2348010000012", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (owner, token) = signed_in(&pool, app.app(), "Owner", "customer").await;
    give_number(&pool, mine.id, owner.id).await;

    let response = get_auth(app.app(), "/api/numbers/mine", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let items = json["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], mine.id);
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

/// The owner can give a number back; it returns to the catalogue.
#[sqlx::test(migrations = "../../db/migrations")]
async fn owner_release_returns_number_to_inventory(pool: PgPool) {
    let number = create_number(&pool, "+2348010000021", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (owner, token) = signed_in(&pool, app.app(), "Owner", "customer").await;
    give_number(&pool, number.id, owner.id).await;

    let uri = format!("/api/numbers/{}/release", number.id);
    let response = post_auth(app.app(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], STATUS_AVAILABLE);

    let stored = PhoneNumberRepo::find_by_id(&pool, number.id).await.unwrap().unwrap();
    assert_eq!(stored.owner_id, None);
    assert_eq!(stored.assigned_at, None);

    let response = post_auth(app.app(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND, "no longer the owner");
}

/// Someone else's number looks like a missing one.
#[sqlx::test(migrations = "../../db/migrations")]
async fn stranger_cannot_release(pool: PgPool) {
    let number = create_number(&pool, "+2348010000031", 100_000).await;
    let app = common::build_test_app(pool.clone());
    let (owner, _) = signed_in(&pool, app.app(), "Owner", "customer").await;
    let (_, stranger_token) = signed_in(&pool, app.app(), "Stranger", "customer").await;
    give_number(&pool, number.id, owner.id).await;

    let uri = format!("/api/numbers/{}/release", number.id);
    let response = post_auth(app.app(), &uri, &stranger_token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let stored = PhoneNumberRepo::find_by_id(&pool, number.id).await.unwrap().unwrap();
    assert_eq!(stored.owner_id, Some(owner.id));
}
