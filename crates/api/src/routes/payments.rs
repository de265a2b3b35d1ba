//! Route definitions for `/payments`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::payments;
use crate::state::AppState;

/// Routes mounted at `/payments`.
///
/// ```text
/// GET    /                     -> list_mine
/// GET    /verify/{reference}   -> verify
/// POST   /webhook              -> webhook (gateway, signature-checked)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(payments::list_mine))
        .route("/verify/{reference}", get(payments::verify))
        .route("/webhook", post(payments::webhook))
}
