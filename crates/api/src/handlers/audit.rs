//! Handlers for the audit trail: querying, export and hash-chain checks.
//!
//! All endpoints require the admin role.

use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use onenumber_core::types::DbId;
use onenumber_db::models::audit::{AuditLog, AuditLogPage, AuditQuery, IntegrityCheckResult};
use onenumber_db::repositories::AuditLogRepo;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default export window when `from` is omitted.
const DEFAULT_EXPORT_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// Query parameter types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AuditLogQueryParams {
    pub user_id: Option<DbId>,
    pub action_type: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub from: Option<String>,
    pub to: Option<String>,
    /// `json` (default) or `csv`.
    pub format: Option<String>,
}

/// Parse an optional RFC 3339 timestamp.
fn parse_timestamp(raw: Option<&str>, field: &str) -> AppResult<Option<DateTime<Utc>>> {
    raw.map(|v| {
        v.parse::<DateTime<Utc>>()
            .map_err(|_| AppError::BadRequest(format!("Invalid {field} timestamp, expected RFC 3339")))
    })
    .transpose()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/admin/audit-logs
pub async fn query_audit_logs(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<AuditLogQueryParams>,
) -> AppResult<Json<DataResponse<AuditLogPage>>> {
    let query = AuditQuery {
        user_id: params.user_id,
        action_type: params.action_type,
        entity_type: params.entity_type,
        entity_id: params.entity_id,
        from: parse_timestamp(params.from.as_deref(), "from")?,
        to: parse_timestamp(params.to.as_deref(), "to")?,
        limit: params.limit,
        offset: params.offset,
    };

    let items = AuditLogRepo::query(&state.pool, &query).await?;
    let total = AuditLogRepo::count(&state.pool, &query).await?;

    Ok(Json(DataResponse {
        data: AuditLogPage { items, total },
    }))
}

/// GET /api/admin/audit-logs/export?format=csv|json&from=X&to=Y
///
/// Defaults to the last 30 days.
pub async fn export_audit_logs(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(params): Query<ExportParams>,
) -> AppResult<Response> {
    let now = Utc::now();
    let from = parse_timestamp(params.from.as_deref(), "from")?
        .unwrap_or(now - Duration::days(DEFAULT_EXPORT_DAYS));
    let to = parse_timestamp(params.to.as_deref(), "to")?.unwrap_or(now);
    if from > to {
        return Err(AppError::BadRequest("`from` must not be after `to`".into()));
    }

    let logs = AuditLogRepo::export_range(&state.pool, from, to).await?;
    tracing::info!(admin_id = admin.user_id, entries = logs.len(), "Audit log exported");

    match params.format.as_deref().unwrap_or("json") {
        "csv" => Ok((
            [
                (CONTENT_TYPE, "text/csv; charset=utf-8"),
                (CONTENT_DISPOSITION, "attachment; filename=\"audit-logs.csv\""),
            ],
            render_csv(&logs),
        )
            .into_response()),
        "json" => Ok(Json(DataResponse { data: logs }).into_response()),
        other => Err(AppError::BadRequest(format!(
            "Unsupported export format '{other}', use csv or json"
        ))),
    }
}

/// GET /api/admin/audit-logs/integrity-check
pub async fn check_integrity(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<IntegrityCheckResult>>> {
    let result = AuditLogRepo::verify_chain(&state.pool).await?;
    if !result.chain_valid {
        tracing::error!(first_break = ?result.first_break, "Audit chain integrity check failed");
    }
    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

const CSV_HEADER: &str =
    "id,timestamp,user_id,action_type,entity_type,entity_id,details,ip_address,user_agent,integrity_hash\n";

fn render_csv(logs: &[AuditLog]) -> String {
    let mut out = String::from(CSV_HEADER);
    for log in logs {
        let fields = [
            log.id.to_string(),
            log.timestamp.to_rfc3339(),
            log.user_id.map(|id| id.to_string()).unwrap_or_default(),
            log.action_type.clone(),
            log.entity_type.clone().unwrap_or_default(),
            log.entity_id.map(|id| id.to_string()).unwrap_or_default(),
            log.details_json
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default(),
            log.ip_address.clone().unwrap_or_default(),
            log.user_agent.clone().unwrap_or_default(),
            log.integrity_hash.clone(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
