//! Route definitions for `/users`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// POST   /register               -> register (public)
/// POST   /login                  -> login (public)
/// POST   /refresh                -> refresh (public)
/// POST   /logout                 -> logout
/// GET    /profile                -> get_profile
/// PUT    /profile                -> update_profile
/// PUT    /password               -> change_password
/// POST   /verify-email           -> verify_email (public)
/// POST   /resend-verification    -> resend_verification
/// POST   /forgot-password        -> forgot_password (public)
/// POST   /reset-password         -> reset_password (public)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/refresh", post(users::refresh))
        .route("/logout", post(users::logout))
        .route("/profile", get(users::get_profile).put(users::update_profile))
        .route("/password", put(users::change_password))
        .route("/verify-email", post(users::verify_email))
        .route("/resend-verification", post(users::resend_verification))
        .route("/forgot-password", post(users::forgot_password))
        .route("/reset-password", post(users::reset_password))
}
