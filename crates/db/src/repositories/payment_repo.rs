//! Repository for the `payment_transactions` table.
//!
//! A transaction is written once as `pending` and then moves to exactly one
//! terminal status. Every status update is guarded by `status = 'pending'`,
//! which makes finalization safe to run twice for the same reference.

use onenumber_core::payment::{STATUS_ABANDONED, STATUS_FAILED, STATUS_PENDING, STATUS_SUCCESS};
use onenumber_core::search::{clamp_limit, clamp_offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use onenumber_core::types::{DbId, MinorUnits};
use sqlx::PgPool;

use crate::models::payment::{CreatePaymentTransaction, PaymentFilter, PaymentTransaction};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, subscription_id, reference, gateway, amount, currency, \
                        status, purpose, authorization_url, gateway_response, paid_at, \
                        created_at, updated_at";

/// Provides storage for payment transactions.
pub struct PaymentTransactionRepo;

impl PaymentTransactionRepo {
    /// Record a new `pending` transaction.
    pub async fn create(
        pool: &PgPool,
        input: &CreatePaymentTransaction,
    ) -> Result<PaymentTransaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO payment_transactions
                (user_id, subscription_id, reference, gateway, amount, currency, purpose)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PaymentTransaction>(&query)
            .bind(input.user_id)
            .bind(input.subscription_id)
            .bind(&input.reference)
            .bind(&input.gateway)
            .bind(input.amount)
            .bind(&input.currency)
            .bind(&input.purpose)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_reference(
        pool: &PgPool,
        reference: &str,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payment_transactions WHERE reference = $1");
        sqlx::query_as::<_, PaymentTransaction>(&query)
            .bind(reference)
            .fetch_optional(pool)
            .await
    }

    /// A customer's transactions, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payment_transactions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, PaymentTransaction>(&query)
            .bind(user_id)
            .bind(clamp_limit(limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE))
            .bind(clamp_offset(offset))
            .fetch_all(pool)
            .await
    }

    /// Admin listing with optional status and user filters.
    pub async fn list(
        pool: &PgPool,
        filter: &PaymentFilter,
    ) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payment_transactions
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::BIGINT IS NULL OR user_id = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, PaymentTransaction>(&query)
            .bind(&filter.status)
            .bind(filter.user_id)
            .bind(clamp_limit(filter.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE))
            .bind(clamp_offset(filter.offset))
            .fetch_all(pool)
            .await
    }

    /// Count rows matching [`PaymentTransactionRepo::list`].
    pub async fn count(pool: &PgPool, filter: &PaymentFilter) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM payment_transactions
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::BIGINT IS NULL OR user_id = $2)",
        )
        .bind(&filter.status)
        .bind(filter.user_id)
        .fetch_one(pool)
        .await
    }

    /// Store the hosted checkout URL returned by the gateway.
    pub async fn set_authorization_url(
        pool: &PgPool,
        id: DbId,
        url: &str,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        let query = format!(
            "UPDATE payment_transactions SET authorization_url = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PaymentTransaction>(&query)
            .bind(id)
            .bind(url)
            .fetch_optional(pool)
            .await
    }

    /// `pending -> success`. Returns `None` when the transaction was already
    /// finalized, so only one caller ever applies the side effects.
    pub async fn mark_success(
        pool: &PgPool,
        id: DbId,
        gateway_response: &serde_json::Value,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        let query = format!(
            "UPDATE payment_transactions SET
                status = $3, gateway_response = $2, paid_at = NOW()
             WHERE id = $1 AND status = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PaymentTransaction>(&query)
            .bind(id)
            .bind(gateway_response)
            .bind(STATUS_SUCCESS)
            .bind(STATUS_PENDING)
            .fetch_optional(pool)
            .await
    }

    /// `pending -> failed`.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        gateway_response: Option<&serde_json::Value>,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        let query = format!(
            "UPDATE payment_transactions SET
                status = $3, gateway_response = COALESCE($2, gateway_response)
             WHERE id = $1 AND status = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PaymentTransaction>(&query)
            .bind(id)
            .bind(gateway_response)
            .bind(STATUS_FAILED)
            .bind(STATUS_PENDING)
            .fetch_optional(pool)
            .await
    }

    /// Abandon pending transactions belonging to the given subscriptions
    /// (their reservations lapsed). Returns the number of rows changed.
    pub async fn abandon_stale_pending(
        pool: &PgPool,
        subscription_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        if subscription_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE payment_transactions SET status = $2
             WHERE status = $3 AND subscription_id = ANY($1)",
        )
        .bind(subscription_ids)
        .bind(STATUS_ABANDONED)
        .bind(STATUS_PENDING)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Whether a renewal for this subscription is already waiting on the gateway.
    pub async fn find_pending_for_subscription(
        pool: &PgPool,
        subscription_id: DbId,
        purpose: &str,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payment_transactions
             WHERE subscription_id = $1 AND purpose = $2 AND status = $3
             ORDER BY created_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, PaymentTransaction>(&query)
            .bind(subscription_id)
            .bind(purpose)
            .bind(STATUS_PENDING)
            .fetch_optional(pool)
            .await
    }

    /// Sum of successful payments in minor units.
    pub async fn revenue_total(pool: &PgPool) -> Result<MinorUnits, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payment_transactions WHERE status = $1",
        )
        .bind(STATUS_SUCCESS)
        .fetch_one(pool)
        .await
    }
}
