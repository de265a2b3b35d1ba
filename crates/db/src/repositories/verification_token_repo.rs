//! Repository for the `verification_tokens` table.

use sqlx::PgPool;

use crate::models::verification_token::{CreateVerificationToken, VerificationToken};

const COLUMNS: &str = "id, user_id, purpose, token_hash, expires_at, consumed_at, created_at";

pub struct VerificationTokenRepo;

impl VerificationTokenRepo {
    /// Store a new token, invalidating any unconsumed token of the same
    /// purpose for the user so only the latest emailed link works.
    pub async fn create(
        pool: &PgPool,
        input: &CreateVerificationToken,
    ) -> Result<VerificationToken, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE verification_tokens SET consumed_at = NOW()
             WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL",
        )
        .bind(input.user_id)
        .bind(&input.purpose)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO verification_tokens (user_id, purpose, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let token = sqlx::query_as::<_, VerificationToken>(&query)
            .bind(input.user_id)
            .bind(&input.purpose)
            .bind(&input.token_hash)
            .bind(input.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(token)
    }

    /// Atomically consume a live token. Returns `None` if the token is
    /// unknown, expired, already used, or issued for another purpose.
    pub async fn consume(
        pool: &PgPool,
        token_hash: &str,
        purpose: &str,
    ) -> Result<Option<VerificationToken>, sqlx::Error> {
        let query = format!(
            "UPDATE verification_tokens SET consumed_at = NOW()
             WHERE token_hash = $1
               AND purpose = $2
               AND consumed_at IS NULL
               AND expires_at > NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VerificationToken>(&query)
            .bind(token_hash)
            .bind(purpose)
            .fetch_optional(pool)
            .await
    }

    /// Delete consumed or expired tokens. Returns the count of deleted rows.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM verification_tokens WHERE expires_at < NOW() OR consumed_at IS NOT NULL",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
