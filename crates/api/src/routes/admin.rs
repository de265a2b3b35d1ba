//! Route definitions for the `/admin` back office.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{admin, audit};
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require the `admin` role (enforced by handler extractors).
///
/// ```text
/// GET    /users                        -> list_users
/// GET    /users/{id}                   -> get_user
/// PUT    /users/{id}                   -> update_user
/// DELETE /users/{id}                   -> deactivate_user
/// POST   /users/{id}/reset-password    -> reset_user_password
///
/// GET    /numbers                      -> list_numbers
/// POST   /numbers                      -> create_number
/// POST   /numbers/bulk                 -> bulk_import
/// GET    /numbers/{id}                 -> get_number
/// PUT    /numbers/{id}                 -> update_number
/// DELETE /numbers/{id}                 -> delete_number
/// PUT    /numbers/{id}/status          -> change_status
/// POST   /numbers/{id}/release         -> force_release
///
/// GET    /subscriptions                -> list_subscriptions
/// POST   /subscriptions/{id}/cancel    -> cancel_subscription_admin
/// GET    /payments                     -> list_payments
/// GET    /stats                        -> stats
///
/// GET    /audit-logs                   -> query_audit_logs
/// GET    /audit-logs/export            -> export_audit_logs
/// GET    /audit-logs/integrity-check   -> check_integrity
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route(
            "/users/{id}",
            get(admin::get_user)
                .put(admin::update_user)
                .delete(admin::deactivate_user),
        )
        .route("/users/{id}/reset-password", post(admin::reset_user_password))
        .route("/numbers", get(admin::list_numbers).post(admin::create_number))
        .route("/numbers/bulk", post(admin::bulk_import))
        .route(
            "/numbers/{id}",
            get(admin::get_number)
                .put(admin::update_number)
                .delete(admin::delete_number),
        )
        .route("/numbers/{id}/status", put(admin::change_status))
        .route("/numbers/{id}/release", post(admin::force_release))
        .route("/subscriptions", get(admin::list_subscriptions))
        .route(
            "/subscriptions/{id}/cancel",
            post(admin::cancel_subscription_admin),
        )
        .route("/payments", get(admin::list_payments))
        .route("/stats", get(admin::stats))
        .route("/audit-logs", get(audit::query_audit_logs))
        .route("/audit-logs/export", get(audit::export_audit_logs))
        .route("/audit-logs/integrity-check", get(audit::check_integrity))
}
