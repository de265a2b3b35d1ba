//! Handlers for `/users`: registration, sessions, profile and the
//! email-verification / password-reset token flows.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use onenumber_core::audit::{action_types, entity_types};
use onenumber_core::error::CoreError;
use onenumber_core::phone_number::normalize_e164;
use onenumber_core::roles::ROLE_CUSTOMER;
use onenumber_core::tokens::{self, PURPOSE_EMAIL_VERIFICATION, PURPOSE_PASSWORD_RESET};
use onenumber_core::types::DbId;
use onenumber_db::models::session::CreateSession;
use onenumber_db::models::user::{CreateUser, UpdateProfile, User, UserResponse};
use onenumber_db::models::verification_token::CreateVerificationToken;
use onenumber_db::repositories::{RoleRepo, SessionRepo, UserRepo, VerificationTokenRepo};
use onenumber_events::{event_types, PlatformEvent};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::audit::AuditRecord;
use crate::auth::jwt::{generate_access_token, generate_refresh_token, hash_refresh_token};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::client_info::ClientInfo;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum consecutive failed login attempts before locking the account.
const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Duration in minutes to lock an account after exceeding failed attempts.
const LOCK_DURATION_MINS: i64 = 15;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "must be 2-100 characters"))]
    pub full_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100, message = "must be 2-100 characters"))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Returned by register, login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Registration and sessions
// ---------------------------------------------------------------------------

/// POST /api/users/register
///
/// Create a customer account, email a verification link, and sign the new
/// user in.
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    input.validate()?;
    validate_password_strength(&input.password).map_err(CoreError::Validation)?;

    let email = normalize_email(&input.email);
    let phone = normalize_optional_phone(input.phone.as_deref())?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(CoreError::Conflict("Email is already registered".into()).into());
    }

    let role = RoleRepo::find_by_name(&state.pool, ROLE_CUSTOMER)
        .await?
        .ok_or_else(|| AppError::InternalError("customer role is not seeded".into()))?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            full_name: input.full_name.trim().to_string(),
            email,
            phone,
            password_hash,
            role_id: role.id,
        },
    )
    .await?;

    let token = issue_token(&state, user.id, PURPOSE_EMAIL_VERIFICATION).await?;
    state.event_bus.publish(
        PlatformEvent::new(event_types::USER_REGISTERED)
            .with_source(entity_types::USER, user.id)
            .with_actor(user.id)
            .with_payload(serde_json::json!({ "verification_token": token })),
    );

    AuditRecord::new(action_types::REGISTER)
        .actor(user.id)
        .entity(entity_types::USER, user.id)
        .client(&client)
        .write(&state.pool)
        .await;

    tracing::info!(user_id = user.id, "Customer registered");

    let response = create_auth_response(&state, &user, &role.name, &client).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/users/login
///
/// Authenticate with email + password. Five consecutive failures lock the
/// account for fifteen minutes.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = normalize_email(&input.email);

    let user = UserRepo::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized(INVALID_CREDENTIALS.into())))?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Account is temporarily locked. Try again later.".into(),
            )));
        }
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        let failures = UserRepo::increment_failed_login(&state.pool, user.id).await?;
        if failures >= MAX_FAILED_ATTEMPTS {
            let lock_until = Utc::now() + Duration::minutes(LOCK_DURATION_MINS);
            UserRepo::lock_account(&state.pool, user.id, lock_until).await?;
            tracing::warn!(user_id = user.id, failures, "Account locked after failed logins");
        }

        AuditRecord::new(action_types::LOGIN_FAILED)
            .actor(user.id)
            .entity(entity_types::USER, user.id)
            .details(serde_json::json!({ "failed_attempts": failures }))
            .client(&client)
            .write(&state.pool)
            .await;

        return Err(AppError::Core(CoreError::Unauthorized(
            INVALID_CREDENTIALS.into(),
        )));
    }

    UserRepo::record_successful_login(&state.pool, user.id).await?;
    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;

    AuditRecord::new(action_types::LOGIN)
        .actor(user.id)
        .entity(entity_types::USER, user.id)
        .client(&client)
        .write(&state.pool)
        .await;

    let response = create_auth_response(&state, &user, &role_name, &client).await?;
    Ok(Json(response))
}

/// POST /api/users/refresh
///
/// Exchange a refresh token for a new token pair. The old session is revoked.
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token_hash = hash_refresh_token(&input.refresh_token);

    let session = SessionRepo::consume(&state.pool, &token_hash)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid or expired refresh token".into(),
            ))
        })?;

    let user = UserRepo::find_by_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    let response = create_auth_response(&state, &user, &role_name, &client).await?;
    Ok(Json(response))
}

/// POST /api/users/logout
///
/// Revoke every session of the caller. Returns 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
) -> AppResult<StatusCode> {
    let revoked = SessionRepo::revoke_all_for_user(&state.pool, auth_user.user_id).await?;

    AuditRecord::new(action_types::LOGOUT)
        .actor(auth_user.user_id)
        .entity(entity_types::USER, auth_user.user_id)
        .details(serde_json::json!({ "sessions_revoked": revoked }))
        .client(&client)
        .write(&state.pool)
        .await;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// GET /api/users/profile
pub async fn get_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = load_user(&state, auth_user.user_id).await?;
    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from_user(&user, role_name),
    }))
}

/// PUT /api/users/profile
///
/// Update the caller's name and/or contact phone. Email changes go through
/// an admin.
pub async fn update_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    Json(input): Json<UpdateProfileRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    input.validate()?;

    let update = UpdateProfile {
        full_name: input.full_name.map(|n| n.trim().to_string()),
        phone: normalize_optional_phone(input.phone.as_deref())?,
    };

    let user = UserRepo::update_profile(&state.pool, auth_user.user_id, &update)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: auth_user.user_id,
        })?;

    AuditRecord::new(action_types::USER_UPDATE)
        .actor(user.id)
        .entity(entity_types::USER, user.id)
        .details(serde_json::json!({
            "full_name_changed": update.full_name.is_some(),
            "phone_changed": update.phone.is_some(),
        }))
        .client(&client)
        .write(&state.pool)
        .await;

    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from_user(&user, role_name),
    }))
}

/// PUT /api/users/password
///
/// Change password after re-checking the current one. Every session is
/// revoked, so other devices must sign in again.
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let user = load_user(&state, auth_user.user_id).await?;

    let current_ok = verify_password(&input.current_password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !current_ok {
        return Err(CoreError::Unauthorized("Current password is incorrect".into()).into());
    }

    validate_password_strength(&input.new_password).map_err(CoreError::Validation)?;
    set_password(&state, user.id, &input.new_password).await?;

    AuditRecord::new(action_types::PASSWORD_CHANGE)
        .actor(user.id)
        .entity(entity_types::USER, user.id)
        .client(&client)
        .write(&state.pool)
        .await;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Token flows
// ---------------------------------------------------------------------------

/// POST /api/users/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<TokenRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let token = consume_token(&state, &input.token, PURPOSE_EMAIL_VERIFICATION).await?;

    UserRepo::mark_email_verified(&state.pool, token.user_id).await?;
    let user = load_user(&state, token.user_id).await?;

    AuditRecord::new(action_types::EMAIL_VERIFIED)
        .actor(user.id)
        .entity(entity_types::USER, user.id)
        .client(&client)
        .write(&state.pool)
        .await;

    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from_user(&user, role_name),
    }))
}

/// POST /api/users/resend-verification
///
/// Issue a fresh verification link; older links stop working.
pub async fn resend_verification(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<StatusCode> {
    let user = load_user(&state, auth_user.user_id).await?;
    if user.email_verified_at.is_some() {
        return Err(CoreError::Conflict("Email is already verified".into()).into());
    }

    let token = issue_token(&state, user.id, PURPOSE_EMAIL_VERIFICATION).await?;
    state.event_bus.publish(
        PlatformEvent::new(event_types::USER_VERIFICATION_REQUESTED)
            .with_source(entity_types::USER, user.id)
            .with_actor(user.id)
            .with_payload(serde_json::json!({ "verification_token": token })),
    );

    Ok(StatusCode::ACCEPTED)
}

/// POST /api/users/forgot-password
///
/// Always 202, whether or not the email belongs to an account.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordRequest>,
) -> AppResult<StatusCode> {
    input.validate()?;
    let email = normalize_email(&input.email);

    match UserRepo::find_by_email(&state.pool, &email).await? {
        Some(user) if user.is_active => {
            let token = issue_token(&state, user.id, PURPOSE_PASSWORD_RESET).await?;
            state.event_bus.publish(
                PlatformEvent::new(event_types::USER_PASSWORD_RESET_REQUESTED)
                    .with_source(entity_types::USER, user.id)
                    .with_actor(user.id)
                    .with_payload(serde_json::json!({ "reset_token": token })),
            );
            tracing::info!(user_id = user.id, "Password reset requested");
        }
        _ => tracing::debug!("Password reset requested for unknown or inactive account"),
    }

    Ok(StatusCode::ACCEPTED)
}

/// POST /api/users/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    // Check strength first so a weak password does not burn the token.
    validate_password_strength(&input.new_password).map_err(CoreError::Validation)?;

    let token = consume_token(&state, &input.token, PURPOSE_PASSWORD_RESET).await?;
    set_password(&state, token.user_id, &input.new_password).await?;

    AuditRecord::new(action_types::PASSWORD_RESET)
        .actor(token.user_id)
        .entity(entity_types::USER, token.user_id)
        .client(&client)
        .write(&state.pool)
        .await;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate access + refresh tokens, persist a session row, and build the response.
async fn create_auth_response(
    state: &AppState,
    user: &User,
    role: &str,
    client: &ClientInfo,
) -> AppResult<AuthResponse> {
    let access_token = generate_access_token(user.id, role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let (refresh_plaintext, refresh_hash) = generate_refresh_token();
    let expires_at = Utc::now() + Duration::days(state.config.jwt.refresh_token_expiry_days);

    SessionRepo::create(
        &state.pool,
        &CreateSession {
            user_id: user.id,
            refresh_token_hash: refresh_hash,
            expires_at,
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_address.clone(),
        },
    )
    .await?;

    Ok(AuthResponse {
        access_token,
        refresh_token: refresh_plaintext,
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
        user: UserResponse::from_user(user, role.to_string()),
    })
}

pub(crate) async fn load_user(state: &AppState, user_id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "User",
                id: user_id,
            })
        })
}

/// Hash and store a new password, then revoke every session of the user.
pub(crate) async fn set_password(state: &AppState, user_id: DbId, password: &str) -> AppResult<()> {
    let password_hash = hash_password(password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    if !UserRepo::update_password(&state.pool, user_id, &password_hash).await? {
        return Err(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }
        .into());
    }
    SessionRepo::revoke_all_for_user(&state.pool, user_id).await?;
    Ok(())
}

/// Store a new single-use token and return its plaintext for the email.
async fn issue_token(state: &AppState, user_id: DbId, purpose: &str) -> AppResult<String> {
    let generated = tokens::generate_token();
    VerificationTokenRepo::create(
        &state.pool,
        &CreateVerificationToken {
            user_id,
            purpose: purpose.to_string(),
            token_hash: generated.hash,
            expires_at: Utc::now() + Duration::hours(tokens::ttl_hours(purpose)),
        },
    )
    .await?;
    Ok(generated.plaintext)
}

async fn consume_token(
    state: &AppState,
    plaintext: &str,
    purpose: &str,
) -> AppResult<onenumber_db::models::verification_token::VerificationToken> {
    let token_hash = tokens::hash_token(plaintext.trim());
    VerificationTokenRepo::consume(&state.pool, &token_hash, purpose)
        .await?
        .ok_or_else(|| CoreError::Validation("Invalid or expired token".into()).into())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Contact phones are stored in E.164; blank input clears nothing.
fn normalize_optional_phone(phone: Option<&str>) -> Result<Option<String>, CoreError> {
    match phone.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => normalize_e164(p).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn optional_phone_normalizes_or_skips() {
        assert_eq!(
            normalize_optional_phone(Some("+234 801 234 5678")).unwrap(),
            Some("+2348012345678".to_string())
        );
        assert_eq!(normalize_optional_phone(Some("   ")).unwrap(), None);
        assert_eq!(normalize_optional_phone(None).unwrap(), None);
        assert!(normalize_optional_phone(Some("0801 234 5678")).is_err());
    }

    #[test]
    fn register_request_rules() {
        let ok = RegisterRequest {
            full_name: "Ada Obi".into(),
            email: "ada@example.com".into(),
            phone: None,
            password: "secret123".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            full_name: "A".into(),
            email: "not-an-email".into(),
            phone: None,
            password: "secret123".into(),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("full_name"));
        assert!(fields.contains_key("email"));
    }
}
