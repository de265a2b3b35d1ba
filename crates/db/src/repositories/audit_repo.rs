//! Repository for the append-only `audit_logs` table.

use chrono::{SubsecRound, Utc};
use onenumber_core::audit::{canonical_entry_data, compute_integrity_hash};
use onenumber_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::audit::{AuditLog, AuditQuery, CreateAuditLog, IntegrityCheckResult};

/// Column list for `audit_logs` SELECT queries.
const COLUMNS: &str = "\
    id, timestamp, user_id, action_type, entity_type, entity_id, \
    details_json, ip_address, user_agent, integrity_hash, created_at";

/// Advisory lock key that serializes appends so the hash chain stays linear.
const CHAIN_LOCK_KEY: i64 = 0x4f4e_455f_4155_4454;

/// Shared WHERE clause for [`AuditLogRepo::query`] and [`AuditLogRepo::count`].
const FILTER: &str = "($1::BIGINT IS NULL OR user_id = $1)
    AND ($2::TEXT IS NULL OR action_type = $2)
    AND ($3::TEXT IS NULL OR entity_type = $3)
    AND ($4::BIGINT IS NULL OR entity_id = $4)
    AND ($5::TIMESTAMPTZ IS NULL OR timestamp >= $5)
    AND ($6::TIMESTAMPTZ IS NULL OR timestamp <= $6)";

/// Default and maximum page sizes for audit queries.
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Provides append and query operations for audit logs.
pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Append one entry to the chain.
    ///
    /// Runs in a transaction holding an advisory lock: read the last hash,
    /// hash the new entry on top of it, insert. The timestamp is truncated
    /// to microseconds before hashing so it matches what PostgreSQL stores.
    pub async fn append(pool: &PgPool, entry: &CreateAuditLog) -> Result<AuditLog, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CHAIN_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let prev_hash = sqlx::query_scalar::<_, String>(
            "SELECT integrity_hash FROM audit_logs ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let timestamp = Utc::now().trunc_subsecs(6);
        let data = canonical_entry_data(
            timestamp,
            entry.user_id,
            &entry.action_type,
            entry.entity_type.as_deref(),
            entry.entity_id,
            entry.details_json.as_ref(),
        );
        let integrity_hash = compute_integrity_hash(prev_hash.as_deref(), &data);

        let query = format!(
            "INSERT INTO audit_logs
                (timestamp, user_id, action_type, entity_type, entity_id,
                 details_json, ip_address, user_agent, integrity_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        let log = sqlx::query_as::<_, AuditLog>(&query)
            .bind(timestamp)
            .bind(entry.user_id)
            .bind(&entry.action_type)
            .bind(&entry.entity_type)
            .bind(entry.entity_id)
            .bind(&entry.details_json)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(&integrity_hash)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(log)
    }

    /// Query audit logs with filtering and pagination, newest first.
    pub async fn query(pool: &PgPool, params: &AuditQuery) -> Result<Vec<AuditLog>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM audit_logs WHERE {FILTER}
             ORDER BY id DESC
             LIMIT $7 OFFSET $8"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(params.user_id)
            .bind(&params.action_type)
            .bind(&params.entity_type)
            .bind(params.entity_id)
            .bind(params.from)
            .bind(params.to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count audit logs matching the given filter (for pagination metadata).
    pub async fn count(pool: &PgPool, params: &AuditQuery) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*)::BIGINT FROM audit_logs WHERE {FILTER}");
        sqlx::query_scalar::<_, i64>(&query)
            .bind(params.user_id)
            .bind(&params.action_type)
            .bind(&params.entity_type)
            .bind(params.entity_id)
            .bind(params.from)
            .bind(params.to)
            .fetch_one(pool)
            .await
    }

    /// Export audit log entries within a time range, oldest first.
    pub async fn export_range(
        pool: &PgPool,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<AuditLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_logs
             WHERE timestamp >= $1 AND timestamp <= $2
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// Fetch the whole chain ordered by id for sequential verification.
    pub async fn fetch_for_integrity_check(pool: &PgPool) -> Result<Vec<AuditLog>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM audit_logs ORDER BY id ASC");
        sqlx::query_as::<_, AuditLog>(&query).fetch_all(pool).await
    }

    /// Recompute every hash and report the first entry that does not match.
    pub async fn verify_chain(pool: &PgPool) -> Result<IntegrityCheckResult, sqlx::Error> {
        let entries = Self::fetch_for_integrity_check(pool).await?;
        Ok(verify_entries(&entries))
    }
}

/// Walk `entries` (ordered by id) and check each hash against its predecessor.
pub fn verify_entries(entries: &[AuditLog]) -> IntegrityCheckResult {
    let mut prev: Option<&str> = None;
    for entry in entries {
        let data = canonical_entry_data(
            entry.timestamp,
            entry.user_id,
            &entry.action_type,
            entry.entity_type.as_deref(),
            entry.entity_id,
            entry.details_json.as_ref(),
        );
        if compute_integrity_hash(prev, &data) != entry.integrity_hash {
            return IntegrityCheckResult {
                verified_entries: entries.len() as i64,
                chain_valid: false,
                first_break: Some(entry.id),
            };
        }
        prev = Some(&entry.integrity_hash);
    }
    IntegrityCheckResult {
        verified_entries: entries.len() as i64,
        chain_valid: true,
        first_break: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry(id: i64, prev: Option<&str>, action: &str) -> AuditLog {
        let timestamp = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, id as u32).unwrap();
        let data = canonical_entry_data(timestamp, Some(1), action, None, None, None);
        AuditLog {
            id,
            timestamp,
            user_id: Some(1),
            action_type: action.to_string(),
            entity_type: None,
            entity_id: None,
            details_json: None,
            ip_address: None,
            user_agent: None,
            integrity_hash: compute_integrity_hash(prev, &data),
            created_at: timestamp,
        }
    }

    fn chain(actions: &[&str]) -> Vec<AuditLog> {
        let mut out: Vec<AuditLog> = Vec::new();
        for (i, action) in actions.iter().enumerate() {
            let prev = out.last().map(|e| e.integrity_hash.clone());
            out.push(entry(i as i64 + 1, prev.as_deref(), action));
        }
        out
    }

    #[test]
    fn empty_chain_is_valid() {
        let result = verify_entries(&[]);
        assert!(result.chain_valid);
        assert_eq!(result.verified_entries, 0);
    }

    #[test]
    fn intact_chain_is_valid() {
        let entries = chain(&["login", "logout", "login"]);
        let result = verify_entries(&entries);
        assert!(result.chain_valid);
        assert_eq!(result.first_break, None);
    }

    #[test]
    fn edited_row_breaks_chain() {
        let mut entries = chain(&["login", "logout", "login"]);
        entries[1].action_type = "register".into();
        let result = verify_entries(&entries);
        assert!(!result.chain_valid);
        assert_eq!(result.first_break, Some(2));
    }

    #[test]
    fn deleted_row_breaks_chain() {
        let mut entries = chain(&["login", "logout", "login"]);
        entries.remove(1);
        let result = verify_entries(&entries);
        assert_eq!(result.first_break, Some(3));
    }
}
