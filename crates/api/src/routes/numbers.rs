//! Route definitions for `/numbers`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::numbers;
use crate::state::AppState;

/// Routes mounted at `/numbers`.
///
/// ```text
/// GET    /                 -> search (public)
/// GET    /mine             -> list_mine
/// GET    /{id}             -> get_number (public, more for owner/admin)
/// POST   /{id}/release     -> release
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(numbers::search))
        .route("/mine", get(numbers::list_mine))
        .route("/{id}", get(numbers::get_number))
        .route("/{id}/release", post(numbers::release))
}
