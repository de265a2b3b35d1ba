//! Writing audit entries from handlers and background jobs.
//!
//! Entries are appended best-effort: a failed append is logged at `error`
//! and the request carries on, since the business change it describes has
//! already been committed.

use onenumber_core::audit::redact_sensitive_fields;
use onenumber_core::types::DbId;
use onenumber_db::models::audit::CreateAuditLog;
use onenumber_db::repositories::AuditLogRepo;
use sqlx::PgPool;

use crate::middleware::client_info::ClientInfo;

/// Builder for one audit entry.
///
/// ```ignore
/// AuditRecord::new(action_types::NUMBER_RESERVE)
///     .actor(user.user_id)
///     .entity(entity_types::PHONE_NUMBER, number.id)
///     .client(&client)
///     .write(&state.pool)
///     .await;
/// ```
#[derive(Debug, Clone)]
pub struct AuditRecord(CreateAuditLog);

impl AuditRecord {
    pub fn new(action_type: &str) -> Self {
        Self(CreateAuditLog {
            action_type: action_type.to_string(),
            ..Default::default()
        })
    }

    pub fn actor(mut self, user_id: DbId) -> Self {
        self.0.user_id = Some(user_id);
        self
    }

    pub fn entity(mut self, entity_type: &str, entity_id: DbId) -> Self {
        self.0.entity_type = Some(entity_type.to_string());
        self.0.entity_id = Some(entity_id);
        self
    }

    /// Attach details. Sensitive keys are redacted before storage.
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.0.details_json = Some(redact_sensitive_fields(&details));
        self
    }

    pub fn client(mut self, info: &ClientInfo) -> Self {
        self.0.ip_address = info.ip_address.clone();
        self.0.user_agent = info.user_agent.clone();
        self
    }

    pub async fn write(self, pool: &PgPool) {
        if let Err(e) = AuditLogRepo::append(pool, &self.0).await {
            tracing::error!(
                error = %e,
                action_type = %self.0.action_type,
                entity_id = ?self.0.entity_id,
                "Failed to append audit entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builder_redacts_details() {
        let record = AuditRecord::new("password_change")
            .actor(7)
            .entity("user", 7)
            .details(json!({"new_password": "hunter22", "reason": "user request"}));

        assert_eq!(record.0.user_id, Some(7));
        assert_eq!(record.0.entity_type.as_deref(), Some("user"));
        let details = record.0.details_json.unwrap();
        assert_eq!(details["new_password"], "[REDACTED]");
        assert_eq!(details["reason"], "user request");
    }
}
