//! Route definitions for `/subscriptions`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::subscriptions;
use crate::state::AppState;

/// Routes mounted at `/subscriptions`. All require authentication.
///
/// ```text
/// POST   /                   -> create (checkout)
/// GET    /                   -> list_mine
/// GET    /{id}               -> get_subscription
/// POST   /{id}/cancel        -> cancel
/// POST   /{id}/renew         -> renew
/// PUT    /{id}/auto-renew    -> set_auto_renew
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(subscriptions::list_mine).post(subscriptions::create))
        .route("/{id}", get(subscriptions::get_subscription))
        .route("/{id}/cancel", post(subscriptions::cancel))
        .route("/{id}/renew", post(subscriptions::renew))
        .route("/{id}/auto-renew", put(subscriptions::set_auto_renew))
}
