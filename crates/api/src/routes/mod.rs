pub mod admin;
pub mod health;
pub mod numbers;
pub mod payments;
pub mod subscriptions;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /users/...            registration, sessions, profile, token flows
/// /numbers/...          catalogue search, owned numbers, release
/// /subscriptions/...    checkout, renewal, cancel, auto-renew
/// /payments/...         verify, gateway webhook, history
/// /admin/...            back office (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", users::router())
        .nest("/numbers", numbers::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/payments", payments::router())
        .nest("/admin", admin::router())
}
