//! Repository for the `subscriptions` table.

use onenumber_core::search::{clamp_limit, clamp_offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use onenumber_core::subscription::{
    STATUS_ACTIVE, STATUS_CANCELLED, STATUS_EXPIRED, STATUS_PAST_DUE, STATUS_PENDING,
};
use onenumber_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::subscription::{
    CreateSubscription, Subscription, SubscriptionFilter, SubscriptionSummary,
};
use crate::models::StatusCount;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, user_id, phone_number_id, billing_cycle, amount, currency, status, \
                        auto_renew, current_period_start, current_period_end, cancelled_at, \
                        created_at, updated_at";

/// Columns for [`SubscriptionSummary`], selected from `subscriptions s`
/// joined with `phone_numbers p`.
const SUMMARY_COLUMNS: &str = "s.id, s.user_id, s.phone_number_id, p.number, p.display_number, \
                                s.billing_cycle, s.amount, s.currency, s.status, s.auto_renew, \
                                s.current_period_start, s.current_period_end, s.cancelled_at, \
                                s.created_at";

/// Provides lifecycle operations for subscriptions.
pub struct SubscriptionRepo;

impl SubscriptionRepo {
    /// Insert a `pending` subscription created at checkout.
    pub async fn create(
        pool: &PgPool,
        input: &CreateSubscription,
    ) -> Result<Subscription, sqlx::Error> {
        let query = format!(
            "INSERT INTO subscriptions
                (user_id, phone_number_id, billing_cycle, amount, currency, auto_renew)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(input.user_id)
            .bind(input.phone_number_id)
            .bind(&input.billing_cycle)
            .bind(input.amount)
            .bind(&input.currency)
            .bind(input.auto_renew)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM subscriptions WHERE id = $1");
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a subscription only if it belongs to `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM subscriptions WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// The customer's subscriptions with their numbers, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<SubscriptionSummary>, sqlx::Error> {
        let query = format!(
            "SELECT {SUMMARY_COLUMNS}
             FROM subscriptions s
             JOIN phone_numbers p ON p.id = s.phone_number_id
             WHERE s.user_id = $1
             ORDER BY s.created_at DESC, s.id DESC"
        );
        sqlx::query_as::<_, SubscriptionSummary>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Admin listing with optional status and user filters.
    pub async fn list(
        pool: &PgPool,
        filter: &SubscriptionFilter,
    ) -> Result<Vec<SubscriptionSummary>, sqlx::Error> {
        let limit = clamp_limit(filter.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let offset = clamp_offset(filter.offset);
        let query = format!(
            "SELECT {SUMMARY_COLUMNS}
             FROM subscriptions s
             JOIN phone_numbers p ON p.id = s.phone_number_id
             WHERE ($1::TEXT IS NULL OR s.status = $1)
               AND ($2::BIGINT IS NULL OR s.user_id = $2)
             ORDER BY s.created_at DESC, s.id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, SubscriptionSummary>(&query)
            .bind(&filter.status)
            .bind(filter.user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count rows matching [`SubscriptionRepo::list`].
    pub async fn count(pool: &PgPool, filter: &SubscriptionFilter) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM subscriptions
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::BIGINT IS NULL OR user_id = $2)",
        )
        .bind(&filter.status)
        .bind(filter.user_id)
        .fetch_one(pool)
        .await
    }

    /// `pending -> active` with the first billing period.
    pub async fn activate(
        pool: &PgPool,
        id: DbId,
        period_start: Timestamp,
        period_end: Timestamp,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET
                status = $4, current_period_start = $2, current_period_end = $3
             WHERE id = $1 AND status = $5
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(period_start)
            .bind(period_end)
            .bind(STATUS_ACTIVE)
            .bind(STATUS_PENDING)
            .fetch_optional(pool)
            .await
    }

    /// Move an `active` or `past_due` subscription onto a new period after a
    /// renewal payment. The result is always `active`.
    pub async fn extend_period(
        pool: &PgPool,
        id: DbId,
        period_start: Timestamp,
        period_end: Timestamp,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET
                status = $4, current_period_start = $2, current_period_end = $3
             WHERE id = $1 AND status IN ($4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(period_start)
            .bind(period_end)
            .bind(STATUS_ACTIVE)
            .bind(STATUS_PAST_DUE)
            .fetch_optional(pool)
            .await
    }

    /// `active | past_due -> cancelled`. The number is kept until the period
    /// ends; auto-renew is switched off.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET
                status = $2, cancelled_at = NOW(), auto_renew = false
             WHERE id = $1 AND status IN ($3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(STATUS_CANCELLED)
            .bind(STATUS_ACTIVE)
            .bind(STATUS_PAST_DUE)
            .fetch_optional(pool)
            .await
    }

    /// `active | past_due -> past_due`, used when a renewal payment fails.
    pub async fn mark_past_due(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET status = $2
             WHERE id = $1 AND status IN ($3, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(STATUS_PAST_DUE)
            .bind(STATUS_ACTIVE)
            .fetch_optional(pool)
            .await
    }

    /// Toggle auto-renew on a live (`active` or `past_due`) subscription.
    pub async fn set_auto_renew(
        pool: &PgPool,
        id: DbId,
        auto_renew: bool,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET auto_renew = $2
             WHERE id = $1 AND status IN ($3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(auto_renew)
            .bind(STATUS_ACTIVE)
            .bind(STATUS_PAST_DUE)
            .fetch_optional(pool)
            .await
    }

    /// Expire every holding subscription whose period ended before `now`,
    /// returning the expired rows.
    pub async fn mark_expired_due(
        pool: &PgPool,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET status = $2
             WHERE status IN ($3, $4, $5) AND current_period_end < $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(now)
            .bind(STATUS_EXPIRED)
            .bind(STATUS_ACTIVE)
            .bind(STATUS_PAST_DUE)
            .bind(STATUS_CANCELLED)
            .fetch_all(pool)
            .await
    }

    /// Expire pending checkouts for numbers whose reservation lapsed.
    pub async fn expire_stale_pending(
        pool: &PgPool,
        phone_number_ids: &[DbId],
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        if phone_number_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "UPDATE subscriptions SET status = $2
             WHERE status = $3 AND phone_number_id = ANY($1)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(phone_number_ids)
            .bind(STATUS_EXPIRED)
            .bind(STATUS_PENDING)
            .fetch_all(pool)
            .await
    }

    /// Expire a single pending subscription (checkout that failed at the gateway).
    pub async fn expire_pending(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET status = $2
             WHERE id = $1 AND status = $3
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(STATUS_EXPIRED)
            .bind(STATUS_PENDING)
            .fetch_optional(pool)
            .await
    }

    /// The subscription currently holding a number (`active`, `past_due`
    /// or `cancelled`), if any.
    pub async fn find_holding_for_number(
        pool: &PgPool,
        phone_number_id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM subscriptions
             WHERE phone_number_id = $1 AND status IN ($2, $3, $4)"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(phone_number_id)
            .bind(STATUS_ACTIVE)
            .bind(STATUS_PAST_DUE)
            .bind(STATUS_CANCELLED)
            .fetch_optional(pool)
            .await
    }

    /// Subscription count per status.
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*)::BIGINT AS count FROM subscriptions
             GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await
    }
}
