//! Repository for the `phone_numbers` inventory.
//!
//! Every status change is a single conditional `UPDATE` that names the
//! status it expects to find. A `None` result means the row was not in that
//! state (someone else got there first), which callers surface as a
//! conflict.

use onenumber_core::phone_number::{
    STATUS_ASSIGNED, STATUS_AVAILABLE, STATUS_RESERVED, STATUS_RETIRED,
};
use onenumber_core::search::{clamp_limit, clamp_offset, escape_like, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use onenumber_core::types::{DbId, Timestamp};
use onenumber_core::{payment, subscription};
use sqlx::PgPool;

use crate::models::phone_number::{
    AdminNumberFilter, AvailableNumberFilter, BulkImportResult, CreatePhoneNumber,
    InventoryReturn, PhoneNumber, UpdatePhoneNumber,
};
use crate::models::subscription::Subscription;
use crate::models::StatusCount;
use crate::repositories::subscription_repo::COLUMNS as SUBSCRIPTION_COLUMNS;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, number, display_number, country_code, number_type, vanity_text, \
                        monthly_price, currency, status, reserved_by, reserved_until, \
                        owner_id, assigned_at, created_at, updated_at";

/// WHERE clause for the customer catalogue. `$1` is always `'available'`.
const AVAILABLE_FILTER: &str = "status = $1
    AND ($2::TEXT IS NULL OR country_code = $2)
    AND ($3::TEXT IS NULL OR number_type = $3)
    AND ($4::TEXT IS NULL OR number LIKE $4 OR REPLACE(vanity_text, '-', '') ILIKE $6)
    AND ($5::BIGINT IS NULL OR monthly_price <= $5)";

/// WHERE clause for the admin inventory view.
const ADMIN_FILTER: &str = "($1::TEXT IS NULL OR status = $1)
    AND ($2::TEXT IS NULL OR number_type = $2)
    AND ($3::BIGINT IS NULL OR owner_id = $3)
    AND ($4::TEXT IS NULL OR number LIKE $4 OR display_number LIKE $4 OR vanity_text ILIKE $4)";

/// Provides inventory operations for phone numbers.
pub struct PhoneNumberRepo;

impl PhoneNumberRepo {
    /// Insert a new number in `available` status.
    pub async fn create(
        pool: &PgPool,
        input: &CreatePhoneNumber,
    ) -> Result<PhoneNumber, sqlx::Error> {
        let query = format!(
            "INSERT INTO phone_numbers
                (number, display_number, country_code, number_type, vanity_text,
                 monthly_price, currency)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(&input.number)
            .bind(&input.display_number)
            .bind(&input.country_code)
            .bind(&input.number_type)
            .bind(&input.vanity_text)
            .bind(input.monthly_price)
            .bind(&input.currency)
            .fetch_one(pool)
            .await
    }

    /// Insert many numbers in one transaction. Numbers that already exist
    /// are reported in `skipped` instead of failing the batch.
    pub async fn bulk_create(
        pool: &PgPool,
        inputs: &[CreatePhoneNumber],
    ) -> Result<BulkImportResult, sqlx::Error> {
        let query = format!(
            "INSERT INTO phone_numbers
                (number, display_number, country_code, number_type, vanity_text,
                 monthly_price, currency)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (number) DO NOTHING
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(inputs.len());
        let mut skipped = Vec::new();

        for input in inputs {
            let row = sqlx::query_as::<_, PhoneNumber>(&query)
                .bind(&input.number)
                .bind(&input.display_number)
                .bind(&input.country_code)
                .bind(&input.number_type)
                .bind(&input.vanity_text)
                .bind(input.monthly_price)
                .bind(&input.currency)
                .fetch_optional(&mut *tx)
                .await?;
            match row {
                Some(number) => created.push(number),
                None => skipped.push(input.number.clone()),
            }
        }

        tx.commit().await?;
        Ok(BulkImportResult { created, skipped })
    }

    /// Find a number by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PhoneNumber>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM phone_numbers WHERE id = $1");
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a number by its E.164 form.
    pub async fn find_by_number(
        pool: &PgPool,
        number: &str,
    ) -> Result<Option<PhoneNumber>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM phone_numbers WHERE number = $1");
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(number)
            .fetch_optional(pool)
            .await
    }

    /// Search the purchasable catalogue, cheapest first.
    pub async fn search_available(
        pool: &PgPool,
        filter: &AvailableNumberFilter,
    ) -> Result<Vec<PhoneNumber>, sqlx::Error> {
        let limit = clamp_limit(filter.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let offset = clamp_offset(filter.offset);
        let query = format!(
            "SELECT {COLUMNS} FROM phone_numbers WHERE {AVAILABLE_FILTER}
             ORDER BY monthly_price ASC, number ASC
             LIMIT $7 OFFSET $8"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(STATUS_AVAILABLE)
            .bind(&filter.country_code)
            .bind(&filter.number_type)
            .bind(digits_pattern(filter.contains.as_deref()))
            .bind(filter.max_price)
            .bind(vanity_pattern(filter.contains.as_deref()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count rows matching [`PhoneNumberRepo::search_available`].
    pub async fn count_available(
        pool: &PgPool,
        filter: &AvailableNumberFilter,
    ) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*)::BIGINT FROM phone_numbers WHERE {AVAILABLE_FILTER}");
        sqlx::query_scalar::<_, i64>(&query)
            .bind(STATUS_AVAILABLE)
            .bind(&filter.country_code)
            .bind(&filter.number_type)
            .bind(digits_pattern(filter.contains.as_deref()))
            .bind(filter.max_price)
            .bind(vanity_pattern(filter.contains.as_deref()))
            .fetch_one(pool)
            .await
    }

    /// Admin inventory listing, newest first.
    pub async fn list_all(
        pool: &PgPool,
        filter: &AdminNumberFilter,
    ) -> Result<Vec<PhoneNumber>, sqlx::Error> {
        let limit = clamp_limit(filter.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let offset = clamp_offset(filter.offset);
        let query = format!(
            "SELECT {COLUMNS} FROM phone_numbers WHERE {ADMIN_FILTER}
             ORDER BY created_at DESC, id DESC
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(&filter.status)
            .bind(&filter.number_type)
            .bind(filter.owner_id)
            .bind(admin_search_pattern(filter.search.as_deref()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count rows matching [`PhoneNumberRepo::list_all`].
    pub async fn count_all(pool: &PgPool, filter: &AdminNumberFilter) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*)::BIGINT FROM phone_numbers WHERE {ADMIN_FILTER}");
        sqlx::query_scalar::<_, i64>(&query)
            .bind(&filter.status)
            .bind(&filter.number_type)
            .bind(filter.owner_id)
            .bind(admin_search_pattern(filter.search.as_deref()))
            .fetch_one(pool)
            .await
    }

    /// Numbers currently assigned to `owner_id`.
    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<PhoneNumber>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM phone_numbers
             WHERE owner_id = $1 AND status = $2
             ORDER BY assigned_at DESC NULLS LAST, id DESC"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(owner_id)
            .bind(STATUS_ASSIGNED)
            .fetch_all(pool)
            .await
    }

    /// `available -> reserved` for `user_id` until `until`.
    pub async fn reserve(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        until: Timestamp,
    ) -> Result<Option<PhoneNumber>, sqlx::Error> {
        let query = format!(
            "UPDATE phone_numbers SET
                status = $4, reserved_by = $2, reserved_until = $3
             WHERE id = $1 AND status = $5
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(id)
            .bind(user_id)
            .bind(until)
            .bind(STATUS_RESERVED)
            .bind(STATUS_AVAILABLE)
            .fetch_optional(pool)
            .await
    }

    /// `reserved -> assigned`, only when the reservation belongs to `user_id`.
    ///
    /// The reservation deadline is not checked here: a payment that the
    /// gateway confirms wins even if it lands just after the deadline, as
    /// long as the sweeper has not already released the number.
    pub async fn assign(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<PhoneNumber>, sqlx::Error> {
        let query = format!(
            "UPDATE phone_numbers SET
                status = $3, owner_id = $2, assigned_at = NOW(),
                reserved_by = NULL, reserved_until = NULL
             WHERE id = $1 AND status = $4 AND reserved_by = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(id)
            .bind(user_id)
            .bind(STATUS_ASSIGNED)
            .bind(STATUS_RESERVED)
            .fetch_optional(pool)
            .await
    }

    /// Return a reserved or assigned number to inventory, clearing its holder.
    pub async fn release(pool: &PgPool, id: DbId) -> Result<Option<PhoneNumber>, sqlx::Error> {
        let query = format!(
            "UPDATE phone_numbers SET
                status = $2, owner_id = NULL, assigned_at = NULL,
                reserved_by = NULL, reserved_until = NULL
             WHERE id = $1 AND status IN ($3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(id)
            .bind(STATUS_AVAILABLE)
            .bind(STATUS_RESERVED)
            .bind(STATUS_ASSIGNED)
            .fetch_optional(pool)
            .await
    }

    /// Like [`release`](Self::release), but only while `user_id` still holds
    /// the number, either as its reserver or as its owner.
    pub async fn release_held_by(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<PhoneNumber>, sqlx::Error> {
        let query = format!(
            "UPDATE phone_numbers SET
                status = $3, owner_id = NULL, assigned_at = NULL,
                reserved_by = NULL, reserved_until = NULL
             WHERE id = $1
               AND ((status = $4 AND reserved_by = $2) OR (status = $5 AND owner_id = $2))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(id)
            .bind(user_id)
            .bind(STATUS_AVAILABLE)
            .bind(STATUS_RESERVED)
            .bind(STATUS_ASSIGNED)
            .fetch_optional(pool)
            .await
    }

    /// Compare-and-set status change used by the admin transition endpoint.
    ///
    /// Moving to `available` or `retired` clears holder columns. Moving to
    /// `assigned` keeps the current owner and requires that owner to still
    /// hold a live subscription on the number.
    pub async fn transition_status(
        pool: &PgPool,
        id: DbId,
        from: &str,
        to: &str,
    ) -> Result<Option<PhoneNumber>, sqlx::Error> {
        let query = format!(
            "UPDATE phone_numbers SET
                status = $3,
                owner_id = CASE WHEN $3 IN ($4, $6) THEN NULL ELSE owner_id END,
                assigned_at = CASE WHEN $3 IN ($4, $6) THEN NULL ELSE assigned_at END,
                reserved_by = NULL,
                reserved_until = NULL
             WHERE id = $1 AND status = $2
               AND ($3 <> $5 OR EXISTS (
                    SELECT 1 FROM subscriptions s
                    WHERE s.phone_number_id = phone_numbers.id
                      AND s.user_id = phone_numbers.owner_id
                      AND s.status IN ($7, $8, $9)))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(STATUS_AVAILABLE)
            .bind(STATUS_ASSIGNED)
            .bind(STATUS_RETIRED)
            .bind(subscription::STATUS_ACTIVE)
            .bind(subscription::STATUS_PAST_DUE)
            .bind(subscription::STATUS_CANCELLED)
            .fetch_optional(pool)
            .await
    }

    /// Move a number to `target` (`available` or `retired`) and end whatever
    /// held or was buying it, all in one transaction: the holding
    /// subscription and any pending checkout expire, and their pending
    /// payments are abandoned.
    ///
    /// The number is compare-and-set on `from_status`, and on `owner_id`
    /// when `owner` is given. `None` means it changed first and nothing was
    /// written.
    pub async fn return_to_inventory(
        pool: &PgPool,
        id: DbId,
        from_status: &str,
        target: &str,
        owner: Option<DbId>,
    ) -> Result<Option<InventoryReturn>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE phone_numbers SET
                status = $3, owner_id = NULL, assigned_at = NULL,
                reserved_by = NULL, reserved_until = NULL
             WHERE id = $1 AND status = $2 AND ($4::BIGINT IS NULL OR owner_id = $4)
             RETURNING {COLUMNS}"
        );
        let Some(number) = sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(id)
            .bind(from_status)
            .bind(target)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let query = format!(
            "UPDATE subscriptions SET
                status = $2,
                cancelled_at = COALESCE(cancelled_at, NOW()),
                auto_renew = false
             WHERE phone_number_id = $1 AND status IN ($3, $4, $5)
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        let ended_subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(subscription::STATUS_EXPIRED)
            .bind(subscription::STATUS_ACTIVE)
            .bind(subscription::STATUS_PAST_DUE)
            .bind(subscription::STATUS_CANCELLED)
            .fetch_optional(&mut *tx)
            .await?;

        let query = format!(
            "UPDATE subscriptions SET status = $2
             WHERE phone_number_id = $1 AND status = $3
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        let abandoned_checkout = sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(subscription::STATUS_EXPIRED)
            .bind(subscription::STATUS_PENDING)
            .fetch_optional(&mut *tx)
            .await?;

        let subscription_ids: Vec<DbId> = ended_subscription
            .iter()
            .chain(abandoned_checkout.iter())
            .map(|s| s.id)
            .collect();
        let abandoned_payments = sqlx::query(
            "UPDATE payment_transactions SET status = $2
             WHERE status = $3 AND subscription_id = ANY($1)",
        )
        .bind(&subscription_ids[..])
        .bind(payment::STATUS_ABANDONED)
        .bind(payment::STATUS_PENDING)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(Some(InventoryReturn {
            number,
            ended_subscription,
            abandoned_checkout,
            abandoned_payments,
        }))
    }

    /// Update catalogue fields. Only non-`None` fields are applied.
    pub async fn update_details(
        pool: &PgPool,
        id: DbId,
        input: &UpdatePhoneNumber,
    ) -> Result<Option<PhoneNumber>, sqlx::Error> {
        let query = format!(
            "UPDATE phone_numbers SET
                number_type = COALESCE($2, number_type),
                vanity_text = COALESCE($3, vanity_text),
                monthly_price = COALESCE($4, monthly_price),
                currency = COALESCE($5, currency)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(id)
            .bind(&input.number_type)
            .bind(&input.vanity_text)
            .bind(input.monthly_price)
            .bind(&input.currency)
            .fetch_optional(pool)
            .await
    }

    /// Delete a number that nobody holds. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM phone_numbers WHERE id = $1 AND status IN ($2, $3)
               AND NOT EXISTS (SELECT 1 FROM subscriptions WHERE phone_number_id = $1)",
        )
        .bind(id)
        .bind(STATUS_AVAILABLE)
        .bind(STATUS_RETIRED)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Release every reservation whose deadline has passed, returning the
    /// released rows as they were before release (holder still visible).
    pub async fn release_expired_reservations(
        pool: &PgPool,
        now: Timestamp,
    ) -> Result<Vec<PhoneNumber>, sqlx::Error> {
        let query = format!(
            "WITH expired AS (
                SELECT {COLUMNS} FROM phone_numbers
                WHERE status = $2 AND reserved_until < $1
                FOR UPDATE SKIP LOCKED
             ), released AS (
                UPDATE phone_numbers p SET
                    status = $3, reserved_by = NULL, reserved_until = NULL
                FROM expired e
                WHERE p.id = e.id
                RETURNING p.id
             )
             SELECT e.* FROM expired e JOIN released r ON r.id = e.id"
        );
        sqlx::query_as::<_, PhoneNumber>(&query)
            .bind(now)
            .bind(STATUS_RESERVED)
            .bind(STATUS_AVAILABLE)
            .fetch_all(pool)
            .await
    }

    /// Inventory size per status.
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*)::BIGINT AS count FROM phone_numbers
             GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await
    }
}

/// `LIKE` pattern on `number` for the catalogue `contains` filter.
///
/// Letters are translated with the keypad so `FLOWERS` matches
/// `+18003569377`.
fn digits_pattern(contains: Option<&str>) -> Option<String> {
    let raw = contains.filter(|s| !s.is_empty())?;
    let digits = onenumber_core::phone_number::vanity_to_digits(raw)
        .unwrap_or_else(|_| raw.to_string());
    Some(format!("%{}%", escape_like(&digits)))
}

/// `ILIKE` pattern on the dash-free `vanity_text` for the same filter.
fn vanity_pattern(contains: Option<&str>) -> Option<String> {
    let raw = contains.filter(|s| !s.is_empty())?;
    Some(format!("%{}%", escape_like(&raw.replace('-', ""))))
}

fn admin_search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)))
}
