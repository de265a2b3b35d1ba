//! Handlers for the `/admin` back office: users, inventory, subscriptions,
//! payments and dashboard counts.
//!
//! All handlers require the `admin` role via [`RequireAdmin`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use onenumber_core::audit::{action_types, entity_types};
use onenumber_core::error::CoreError;
use onenumber_core::phone_number::{
    self, format_display, normalize_e164, validate_country_code, validate_number_type,
    validate_price, STATUS_ASSIGNED, STATUS_AVAILABLE, STATUS_RESERVED, STATUS_RETIRED,
    STATUS_SUSPENDED, TYPE_VANITY,
};
use onenumber_core::roles::ROLE_ADMIN;
use onenumber_core::types::{DbId, MinorUnits};
use onenumber_db::models::payment::{PaymentFilter, PaymentTransaction};
use onenumber_db::models::phone_number::{
    AdminNumberFilter, CreatePhoneNumber, PhoneNumber, UpdatePhoneNumber,
};
use onenumber_db::models::role::Role;
use onenumber_db::models::subscription::{Subscription, SubscriptionFilter, SubscriptionSummary};
use onenumber_db::models::user::{AdminUpdateUser, UserFilter, UserResponse};
use onenumber_db::models::StatusCount;
use onenumber_db::repositories::{
    PaymentTransactionRepo, PhoneNumberRepo, RoleRepo, SessionRepo, SubscriptionRepo, UserRepo,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::audit::AuditRecord;
use crate::auth::password::validate_password_strength;
use crate::billing;
use crate::error::{AppError, AppResult};
use crate::handlers::subscriptions::cancel_subscription;
use crate::handlers::users::{load_user, set_password};
use crate::middleware::client_info::ClientInfo;
use crate::middleware::rbac::RequireAdmin;
use crate::query::resolve_page;
use crate::response::{DataResponse, Page};
use crate::state::AppState;

/// Largest batch accepted by the bulk import endpoint.
const MAX_BULK_IMPORT: usize = 1000;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub search: Option<String>,
    /// Role name, e.g. `customer`.
    pub role: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for `PUT /admin/users/{id}`.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 100, message = "must be 2-100 characters"))]
    pub full_name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<DbId>,
    pub is_active: Option<bool>,
}

/// Request body for `POST /admin/users/{id}/reset-password`.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// One inventory row, as entered by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct NumberInput {
    pub number: String,
    /// Country calling code without `+`, e.g. `234`.
    pub country_code: String,
    pub number_type: String,
    pub vanity_text: Option<String>,
    pub monthly_price: MinorUnits,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    pub numbers: Vec<NumberInput>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RejectedRow {
    pub index: usize,
    pub number: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BulkImportResponse {
    pub created: Vec<PhoneNumber>,
    /// Numbers already in inventory.
    pub skipped: Vec<String>,
    /// Rows that failed validation and were not attempted.
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub users: i64,
    pub numbers_by_status: Vec<StatusCount>,
    pub subscriptions_by_status: Vec<StatusCount>,
    /// Sum of successful payments, in minor units.
    pub total_revenue: MinorUnits,
    pub currency: String,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<UserListParams>,
) -> AppResult<Json<DataResponse<Page<UserResponse>>>> {
    let roles = RoleRepo::list(&state.pool).await?;
    let role_id = match params.role.as_deref() {
        Some(name) => Some(
            roles
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.id)
                .ok_or_else(|| CoreError::Validation(format!("Unknown role '{name}'")))?,
        ),
        None => None,
    };

    let filter = UserFilter {
        search: params.search.filter(|s| !s.trim().is_empty()),
        role_id,
        limit: params.limit,
        offset: params.offset,
    };
    let users = UserRepo::list(&state.pool, &filter).await?;
    let total = UserRepo::count(&state.pool, &filter).await?;
    let (limit, offset) = resolve_page(filter.limit, filter.offset);

    Ok(Json(DataResponse {
        data: Page {
            items: users
                .iter()
                .map(|u| UserResponse::from_user(u, role_name(&roles, u.role_id)))
                .collect(),
            total,
            limit,
            offset,
        },
    }))
}

/// GET /api/admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = load_user(&state, id).await?;
    let role = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from_user(&user, role),
    }))
}

/// PUT /api/admin/users/{id}
///
/// Admins cannot deactivate or demote themselves, so there is always at
/// least one admin able to undo a mistake.
pub async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    input.validate()?;

    if id == admin.user_id {
        if input.is_active == Some(false) {
            return Err(AppError::BadRequest("You cannot deactivate your own account".into()));
        }
        if let Some(role_id) = input.role_id {
            let role = RoleRepo::resolve_name(&state.pool, role_id).await?;
            if role != ROLE_ADMIN {
                return Err(AppError::BadRequest("You cannot remove your own admin role".into()));
            }
        }
    }
    if let Some(role_id) = input.role_id {
        RoleRepo::find_by_id(&state.pool, role_id)
            .await?
            .ok_or_else(|| CoreError::Validation(format!("Unknown role id {role_id}")))?;
    }

    let phone = match input.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => Some(normalize_e164(p)?),
        None => None,
    };

    let update = AdminUpdateUser {
        full_name: input.full_name.map(|n| n.trim().to_string()),
        email: input.email.map(|e| e.trim().to_lowercase()),
        phone,
        role_id: input.role_id,
        is_active: input.is_active,
    };
    let user = UserRepo::admin_update(&state.pool, id, &update)
        .await?
        .ok_or(CoreError::NotFound { entity: "User", id })?;

    if update.is_active == Some(false) {
        SessionRepo::revoke_all_for_user(&state.pool, id).await?;
    }

    AuditRecord::new(action_types::USER_UPDATE)
        .actor(admin.user_id)
        .entity(entity_types::USER, id)
        .details(serde_json::json!({
            "full_name": update.full_name,
            "email": update.email,
            "role_id": update.role_id,
            "is_active": update.is_active,
        }))
        .client(&client)
        .write(&state.pool)
        .await;

    let role = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from_user(&user, role),
    }))
}

/// DELETE /api/admin/users/{id}
///
/// Soft delete: the account is deactivated and its sessions revoked.
pub async fn deactivate_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if id == admin.user_id {
        return Err(AppError::BadRequest("You cannot deactivate your own account".into()));
    }
    load_user(&state, id).await?;

    if UserRepo::deactivate(&state.pool, id).await? {
        let revoked = SessionRepo::revoke_all_for_user(&state.pool, id).await?;
        AuditRecord::new(action_types::USER_DEACTIVATE)
            .actor(admin.user_id)
            .entity(entity_types::USER, id)
            .details(serde_json::json!({ "sessions_revoked": revoked }))
            .client(&client)
            .write(&state.pool)
            .await;
        tracing::info!(user_id = id, admin_id = admin.user_id, "User deactivated");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/users/{id}/reset-password
pub async fn reset_user_password(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    validate_password_strength(&input.new_password).map_err(CoreError::Validation)?;
    set_password(&state, id, &input.new_password).await?;

    AuditRecord::new(action_types::PASSWORD_RESET)
        .actor(admin.user_id)
        .entity(entity_types::USER, id)
        .details(serde_json::json!({ "by_admin": true }))
        .client(&client)
        .write(&state.pool)
        .await;

    Ok(StatusCode::NO_CONTENT)
}

fn role_name(roles: &[Role], role_id: DbId) -> String {
    roles
        .iter()
        .find(|r| r.id == role_id)
        .map(|r| r.name.clone())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// GET /api/admin/numbers
pub async fn list_numbers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filter): Query<AdminNumberFilter>,
) -> AppResult<Json<DataResponse<Page<PhoneNumber>>>> {
    if let Some(status) = filter.status.as_deref() {
        phone_number::validate_status(status)?;
    }
    if let Some(number_type) = filter.number_type.as_deref() {
        validate_number_type(number_type)?;
    }

    let items = PhoneNumberRepo::list_all(&state.pool, &filter).await?;
    let total = PhoneNumberRepo::count_all(&state.pool, &filter).await?;
    let (limit, offset) = resolve_page(filter.limit, filter.offset);

    Ok(Json(DataResponse {
        data: Page {
            items,
            total,
            limit,
            offset,
        },
    }))
}

/// POST /api/admin/numbers
pub async fn create_number(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Json(input): Json<NumberInput>,
) -> AppResult<(StatusCode, Json<DataResponse<PhoneNumber>>)> {
    let prepared = prepare_number(&input, &state.config.default_currency)?;
    let created = PhoneNumberRepo::create(&state.pool, &prepared).await?;

    AuditRecord::new(action_types::NUMBER_CREATE)
        .actor(admin.user_id)
        .entity(entity_types::PHONE_NUMBER, created.id)
        .details(serde_json::json!({
            "number": created.number,
            "monthly_price": created.monthly_price,
        }))
        .client(&client)
        .write(&state.pool)
        .await;

    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// POST /api/admin/numbers/bulk
///
/// Import up to 1000 numbers. Invalid rows are reported and skipped; rows
/// whose number already exists are reported as skipped.
pub async fn bulk_import(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Json(input): Json<BulkImportRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<BulkImportResponse>>)> {
    if input.numbers.is_empty() {
        return Err(AppError::BadRequest("No numbers to import".into()));
    }
    if input.numbers.len() > MAX_BULK_IMPORT {
        return Err(AppError::BadRequest(format!(
            "At most {MAX_BULK_IMPORT} numbers can be imported at once"
        )));
    }

    let mut valid = Vec::with_capacity(input.numbers.len());
    let mut rejected = Vec::new();
    for (index, row) in input.numbers.iter().enumerate() {
        match prepare_number(row, &state.config.default_currency) {
            Ok(prepared) => valid.push(prepared),
            Err(e) => rejected.push(RejectedRow {
                index,
                number: row.number.clone(),
                error: e.to_string(),
            }),
        }
    }

    let result = PhoneNumberRepo::bulk_create(&state.pool, &valid).await?;

    AuditRecord::new(action_types::NUMBER_CREATE)
        .actor(admin.user_id)
        .details(serde_json::json!({
            "bulk": true,
            "created": result.created.len(),
            "skipped": result.skipped.len(),
            "rejected": rejected.len(),
        }))
        .client(&client)
        .write(&state.pool)
        .await;

    tracing::info!(
        created = result.created.len(),
        skipped = result.skipped.len(),
        rejected = rejected.len(),
        "Bulk number import finished"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: BulkImportResponse {
                created: result.created,
                skipped: result.skipped,
                rejected,
            },
        }),
    ))
}

/// GET /api/admin/numbers/{id}
pub async fn get_number(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PhoneNumber>>> {
    let number = load_number(&state, id).await?;
    Ok(Json(DataResponse { data: number }))
}

/// PUT /api/admin/numbers/{id}
///
/// Catalogue fields only. Price changes apply to new checkouts; existing
/// subscriptions keep the amount they were sold at.
pub async fn update_number(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdatePhoneNumber>,
) -> AppResult<Json<DataResponse<PhoneNumber>>> {
    let current = load_number(&state, id).await?;

    if let Some(number_type) = input.number_type.as_deref() {
        validate_number_type(number_type)?;
    }
    if let Some(price) = input.monthly_price {
        validate_price(price)?;
    }
    if let Some(currency) = input.currency.take() {
        input.currency = Some(normalize_currency(&currency)?);
    }
    let effective_type = input.number_type.as_deref().unwrap_or(&current.number_type);
    let effective_vanity = input.vanity_text.as_deref().or(current.vanity_text.as_deref());
    check_vanity(effective_type, effective_vanity)?;

    let updated = PhoneNumberRepo::update_details(&state.pool, id, &input)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "PhoneNumber",
            id,
        })?;

    AuditRecord::new(action_types::NUMBER_UPDATE)
        .actor(admin.user_id)
        .entity(entity_types::PHONE_NUMBER, id)
        .details(serde_json::json!({
            "number_type": input.number_type,
            "vanity_text": input.vanity_text,
            "monthly_price": input.monthly_price,
            "currency": input.currency,
        }))
        .client(&client)
        .write(&state.pool)
        .await;

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/admin/numbers/{id}
///
/// Only numbers that are available or retired and were never sold can be
/// deleted; anything else should be retired instead.
pub async fn delete_number(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let number = load_number(&state, id).await?;
    if !phone_number::is_deletable(&number.status) {
        return Err(CoreError::Conflict(format!(
            "A {} number cannot be deleted",
            number.status
        ))
        .into());
    }
    if !PhoneNumberRepo::delete(&state.pool, id).await? {
        return Err(CoreError::Conflict(
            "Number has subscription history or changed state; retire it instead".into(),
        )
        .into());
    }

    AuditRecord::new(action_types::NUMBER_DELETE)
        .actor(admin.user_id)
        .entity(entity_types::PHONE_NUMBER, id)
        .details(serde_json::json!({ "number": number.number }))
        .client(&client)
        .write(&state.pool)
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/numbers/{id}/status
///
/// `reserved` is only reached through checkout, and `assigned` only by
/// reinstating a suspended number whose owner still holds a live
/// subscription. Moving to `available` or `retired` ends whatever
/// subscription held the number.
pub async fn change_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
    Json(input): Json<StatusChangeRequest>,
) -> AppResult<Json<DataResponse<PhoneNumber>>> {
    let target = input.status.trim();
    phone_number::validate_status(target)?;
    let number = load_number(&state, id).await?;
    check_admin_transition(&number.status, target)?;
    if target == STATUS_ASSIGNED {
        let holding = SubscriptionRepo::find_holding_for_number(&state.pool, id).await?;
        if !holding.is_some_and(|s| Some(s.user_id) == number.owner_id) {
            return Err(CoreError::Conflict(
                "No live subscription holds this number; return it to inventory instead".into(),
            )
            .into());
        }
    }

    let changed = match target {
        STATUS_AVAILABLE | STATUS_RETIRED => {
            billing::return_to_inventory(&state, &number, target, None)
                .await?
                .map(|r| r.number)
        }
        _ => PhoneNumberRepo::transition_status(&state.pool, id, &number.status, target).await?,
    }
    .ok_or_else(|| CoreError::Conflict("Number changed state, try again".into()))?;

    AuditRecord::new(action_types::NUMBER_STATUS_CHANGE)
        .actor(admin.user_id)
        .entity(entity_types::PHONE_NUMBER, id)
        .details(serde_json::json!({ "from": number.status, "to": target }))
        .client(&client)
        .write(&state.pool)
        .await;

    tracing::info!(phone_number_id = id, from = %number.status, to = target, "Number status changed");
    Ok(Json(DataResponse { data: changed }))
}

/// POST /api/admin/numbers/{id}/release
///
/// Force a held number back to inventory, ending its subscription.
pub async fn force_release(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PhoneNumber>>> {
    let number = load_number(&state, id).await?;
    if !matches!(
        number.status.as_str(),
        STATUS_RESERVED | STATUS_ASSIGNED | STATUS_SUSPENDED
    ) {
        return Err(CoreError::Conflict(format!(
            "A {} number is not held by anyone",
            number.status
        ))
        .into());
    }

    let released = billing::return_to_inventory(&state, &number, STATUS_AVAILABLE, None)
        .await?
        .map(|r| r.number)
        .ok_or_else(|| CoreError::Conflict("Number changed state, try again".into()))?;

    AuditRecord::new(action_types::NUMBER_RELEASE)
        .actor(admin.user_id)
        .entity(entity_types::PHONE_NUMBER, id)
        .details(serde_json::json!({
            "previous_status": number.status,
            "previous_owner": number.owner_id.or(number.reserved_by),
            "forced": true,
        }))
        .client(&client)
        .write(&state.pool)
        .await;

    Ok(Json(DataResponse { data: released }))
}

async fn load_number(state: &AppState, id: DbId) -> AppResult<PhoneNumber> {
    PhoneNumberRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "PhoneNumber",
                id,
            }
            .into()
        })
}

/// Normalize and validate one admin-entered inventory row.
fn prepare_number(input: &NumberInput, default_currency: &str) -> Result<CreatePhoneNumber, CoreError> {
    let number = normalize_e164(&input.number)?;
    let country_code = input.country_code.trim().trim_start_matches('+').to_string();
    validate_country_code(&number, &country_code)?;
    validate_number_type(&input.number_type)?;
    validate_price(input.monthly_price)?;

    let vanity_text = input
        .vanity_text
        .as_deref()
        .map(|v| v.trim().to_uppercase())
        .filter(|v| !v.is_empty());
    check_vanity(&input.number_type, vanity_text.as_deref())?;

    let currency = match input.currency.as_deref() {
        Some(c) => normalize_currency(c)?,
        None => default_currency.to_string(),
    };

    Ok(CreatePhoneNumber {
        display_number: format_display(&number, &country_code),
        number,
        country_code,
        number_type: input.number_type.clone(),
        vanity_text,
        monthly_price: input.monthly_price,
        currency,
    })
}

/// Vanity numbers need their vanity text, and the text must be spellable
/// on a keypad.
fn check_vanity(number_type: &str, vanity_text: Option<&str>) -> Result<(), CoreError> {
    match vanity_text {
        Some(text) => phone_number::vanity_to_digits(text).map(|_| ()),
        None if number_type == TYPE_VANITY => Err(CoreError::Validation(
            "Vanity numbers require vanity_text".into(),
        )),
        None => Ok(()),
    }
}

fn normalize_currency(raw: &str) -> Result<String, CoreError> {
    let code = raw.trim().to_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(CoreError::Validation(format!(
            "Invalid currency '{raw}'. Use a 3-letter ISO code"
        )))
    }
}

fn check_admin_transition(current: &str, target: &str) -> Result<(), CoreError> {
    if target == STATUS_RESERVED {
        return Err(CoreError::Validation(
            "Numbers are reserved through checkout only".into(),
        ));
    }
    if target == STATUS_ASSIGNED && current != STATUS_SUSPENDED {
        return Err(CoreError::Validation(
            "Only a suspended number can be reinstated as assigned".into(),
        ));
    }
    phone_number::validate_transition(current, target)
}

// ---------------------------------------------------------------------------
// Subscriptions and payments
// ---------------------------------------------------------------------------

/// GET /api/admin/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filter): Query<SubscriptionFilter>,
) -> AppResult<Json<DataResponse<Page<SubscriptionSummary>>>> {
    if let Some(status) = filter.status.as_deref() {
        onenumber_core::subscription::validate_status(status)?;
    }
    let items = SubscriptionRepo::list(&state.pool, &filter).await?;
    let total = SubscriptionRepo::count(&state.pool, &filter).await?;
    let (limit, offset) = resolve_page(filter.limit, filter.offset);

    Ok(Json(DataResponse {
        data: Page {
            items,
            total,
            limit,
            offset,
        },
    }))
}

/// POST /api/admin/subscriptions/{id}/cancel
pub async fn cancel_subscription_admin(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Subscription>>> {
    let sub = SubscriptionRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Subscription",
            id,
        })?;
    let cancelled = cancel_subscription(&state, &sub, admin.user_id, &client).await?;
    Ok(Json(DataResponse { data: cancelled }))
}

/// GET /api/admin/payments
pub async fn list_payments(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filter): Query<PaymentFilter>,
) -> AppResult<Json<DataResponse<Page<PaymentTransaction>>>> {
    if let Some(status) = filter.status.as_deref() {
        onenumber_core::payment::validate_status(status)?;
    }
    let items = PaymentTransactionRepo::list(&state.pool, &filter).await?;
    let total = PaymentTransactionRepo::count(&state.pool, &filter).await?;
    let (limit, offset) = resolve_page(filter.limit, filter.offset);

    Ok(Json(DataResponse {
        data: Page {
            items,
            total,
            limit,
            offset,
        },
    }))
}

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<DashboardStats>>> {
    let users = UserRepo::count(&state.pool, &UserFilter::default()).await?;
    let numbers_by_status = PhoneNumberRepo::count_by_status(&state.pool).await?;
    let subscriptions_by_status = SubscriptionRepo::count_by_status(&state.pool).await?;
    let total_revenue = PaymentTransactionRepo::revenue_total(&state.pool).await?;

    Ok(Json(DataResponse {
        data: DashboardStats {
            users,
            numbers_by_status,
            subscriptions_by_status,
            total_revenue,
            currency: state.config.default_currency.clone(),
        },
    }))
}
