//! Integration tests for the audit hash chain, payment finalization guards,
//! and single-use verification tokens.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use onenumber_core::audit::action_types;
use onenumber_core::payment::{PURPOSE_NEW_SUBSCRIPTION, STATUS_SUCCESS};
use onenumber_core::subscription::CYCLE_MONTHLY;
use onenumber_core::tokens::PURPOSE_PASSWORD_RESET;
use onenumber_db::models::audit::{AuditQuery, CreateAuditLog};
use onenumber_db::models::payment::CreatePaymentTransaction;
use onenumber_db::models::phone_number::CreatePhoneNumber;
use onenumber_db::models::subscription::CreateSubscription;
use onenumber_db::models::user::CreateUser;
use onenumber_db::models::verification_token::CreateVerificationToken;
use onenumber_db::repositories::{
    AuditLogRepo, PaymentTransactionRepo, PhoneNumberRepo, SubscriptionRepo, UserRepo,
    VerificationTokenRepo,
};

fn log(action: &str, user_id: Option<i64>) -> CreateAuditLog {
    CreateAuditLog {
        user_id,
        action_type: action.to_string(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Audit chain
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_appended_chain_verifies(pool: PgPool) {
    AuditLogRepo::append(&pool, &log(action_types::REGISTER, Some(1))).await.unwrap();
    AuditLogRepo::append(&pool, &log(action_types::LOGIN, Some(1))).await.unwrap();
    AuditLogRepo::append(&pool, &log(action_types::SYSTEM, None)).await.unwrap();

    let result = AuditLogRepo::verify_chain(&pool).await.unwrap();
    assert!(result.chain_valid);
    assert_eq!(result.verified_entries, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_tampered_row_is_detected(pool: PgPool) {
    AuditLogRepo::append(&pool, &log(action_types::LOGIN, Some(1))).await.unwrap();
    let second = AuditLogRepo::append(&pool, &log(action_types::LOGIN, Some(1)))
        .await
        .unwrap();
    AuditLogRepo::append(&pool, &log(action_types::LOGOUT, Some(1))).await.unwrap();

    sqlx::query("UPDATE audit_logs SET user_id = 99 WHERE id = $1")
        .bind(second.id)
        .execute(&pool)
        .await
        .unwrap();

    let result = AuditLogRepo::verify_chain(&pool).await.unwrap();
    assert!(!result.chain_valid);
    assert_eq!(result.first_break, Some(second.id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_edited_details_are_detected(pool: PgPool) {
    let flagged = AuditLogRepo::append(
        &pool,
        &CreateAuditLog {
            action_type: action_types::SYSTEM.to_string(),
            details_json: Some(serde_json::json!({
                "reference": "ONE-20261018080000-ABCDEFGHIJKL",
                "amount": 150_000,
                "requires_refund": true,
            })),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    AuditLogRepo::append(&pool, &log(action_types::LOGIN, Some(1))).await.unwrap();

    let intact = AuditLogRepo::verify_chain(&pool).await.unwrap();
    assert!(intact.chain_valid, "JSONB round trip keeps the hash stable");

    sqlx::query(
        "UPDATE audit_logs SET details_json = jsonb_set(details_json, '{requires_refund}', 'false')
         WHERE id = $1",
    )
    .bind(flagged.id)
    .execute(&pool)
    .await
    .unwrap();

    let result = AuditLogRepo::verify_chain(&pool).await.unwrap();
    assert!(!result.chain_valid);
    assert_eq!(result.first_break, Some(flagged.id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_query_filters_and_counts(pool: PgPool) {
    AuditLogRepo::append(&pool, &log(action_types::LOGIN, Some(1))).await.unwrap();
    AuditLogRepo::append(&pool, &log(action_types::LOGIN, Some(2))).await.unwrap();
    AuditLogRepo::append(&pool, &log(action_types::LOGOUT, Some(1))).await.unwrap();

    let params = AuditQuery {
        user_id: Some(1),
        ..Default::default()
    };
    let items = AuditLogRepo::query(&pool, &params).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].action_type, action_types::LOGOUT, "newest first");
    assert_eq!(AuditLogRepo::count(&pool, &params).await.unwrap(), 2);

    let range = AuditLogRepo::export_range(
        &pool,
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::hours(1),
    )
    .await
    .unwrap();
    assert_eq!(range.len(), 3);
}

// ---------------------------------------------------------------------------
// Payment guards
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mark_success_only_once(pool: PgPool) {
    let user = UserRepo::create(
        &pool,
        &CreateUser {
            full_name: "Ada Obi".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password_hash: "x".to_string(),
            role_id: 2,
        },
    )
    .await
    .unwrap();
    let number = PhoneNumberRepo::create(
        &pool,
        &CreatePhoneNumber {
            number: "+2348011111111".to_string(),
            display_number: "+234 801 111 1111".to_string(),
            country_code: "234".to_string(),
            number_type: "mobile".to_string(),
            vanity_text: None,
            monthly_price: 150_000,
            currency: "NGN".to_string(),
        },
    )
    .await
    .unwrap();
    let sub = SubscriptionRepo::create(
        &pool,
        &CreateSubscription {
            user_id: user.id,
            phone_number_id: number.id,
            billing_cycle: CYCLE_MONTHLY.to_string(),
            amount: 150_000,
            currency: "NGN".to_string(),
            auto_renew: true,
        },
    )
    .await
    .unwrap();
    let tx = PaymentTransactionRepo::create(
        &pool,
        &CreatePaymentTransaction {
            user_id: user.id,
            subscription_id: sub.id,
            reference: "ONE-20261018080000-ABCDEFGHIJKL".to_string(),
            gateway: "budpay".to_string(),
            amount: 150_000,
            currency: "NGN".to_string(),
            purpose: PURPOSE_NEW_SUBSCRIPTION.to_string(),
        },
    )
    .await
    .unwrap();

    let payload = serde_json::json!({"status": "success"});
    let first = PaymentTransactionRepo::mark_success(&pool, tx.id, &payload).await.unwrap();
    let second = PaymentTransactionRepo::mark_success(&pool, tx.id, &payload).await.unwrap();

    assert_eq!(first.unwrap().status, STATUS_SUCCESS);
    assert!(second.is_none());
    assert!(PaymentTransactionRepo::mark_failed(&pool, tx.id, None).await.unwrap().is_none());
    assert_eq!(PaymentTransactionRepo::revenue_total(&pool).await.unwrap(), 150_000);
}

// ---------------------------------------------------------------------------
// Verification tokens
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_token_is_single_use_and_latest_wins(pool: PgPool) {
    let user = UserRepo::create(
        &pool,
        &CreateUser {
            full_name: "Bola Ade".to_string(),
            email: "bola@example.com".to_string(),
            phone: None,
            password_hash: "x".to_string(),
            role_id: 2,
        },
    )
    .await
    .unwrap();
    let expires_at = Utc::now() + Duration::hours(1);
    let token = |hash: &str| CreateVerificationToken {
        user_id: user.id,
        purpose: PURPOSE_PASSWORD_RESET.to_string(),
        token_hash: hash.to_string(),
        expires_at,
    };

    VerificationTokenRepo::create(&pool, &token("hash-old")).await.unwrap();
    VerificationTokenRepo::create(&pool, &token("hash-new")).await.unwrap();

    let old = VerificationTokenRepo::consume(&pool, "hash-old", PURPOSE_PASSWORD_RESET)
        .await
        .unwrap();
    assert!(old.is_none(), "older token is invalidated");

    let new = VerificationTokenRepo::consume(&pool, "hash-new", PURPOSE_PASSWORD_RESET)
        .await
        .unwrap();
    assert_eq!(new.unwrap().user_id, user.id);

    let again = VerificationTokenRepo::consume(&pool, "hash-new", PURPOSE_PASSWORD_RESET)
        .await
        .unwrap();
    assert!(again.is_none());
}
