//! Handlers for `/numbers`: the public catalogue and a customer's own
//! numbers.

use axum::extract::{Path, Query, State};
use axum::Json;
use onenumber_core::audit::{action_types, entity_types};
use onenumber_core::error::CoreError;
use onenumber_core::phone_number::{
    search_fragment, validate_number_type, STATUS_ASSIGNED, STATUS_AVAILABLE,
};
use onenumber_core::types::DbId;
use onenumber_db::models::phone_number::{AvailableNumberFilter, PhoneNumber, PhoneNumberListing};
use onenumber_db::repositories::PhoneNumberRepo;

use crate::audit::AuditRecord;
use crate::billing;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::client_info::ClientInfo;
use crate::query::resolve_page;
use crate::response::{DataResponse, Page};
use crate::state::AppState;

/// GET /api/numbers
///
/// Search purchasable numbers. `contains` matches digits anywhere in the
/// number, with letters translated by the phone keypad, so
/// `contains=FLOWERS` finds `+1 800 356 9377`. Letters also match the
/// number's vanity text directly.
pub async fn search(
    State(state): State<AppState>,
    Query(mut filter): Query<AvailableNumberFilter>,
) -> AppResult<Json<DataResponse<Page<PhoneNumberListing>>>> {
    if let Some(number_type) = filter.number_type.as_deref() {
        validate_number_type(number_type)?;
    }
    filter.contains = match filter.contains.take() {
        Some(raw) => search_fragment(&raw)?,
        None => None,
    };
    if let Some(cc) = filter.country_code.as_deref() {
        filter.country_code = Some(cc.trim_start_matches('+').to_string());
    }

    let items = PhoneNumberRepo::search_available(&state.pool, &filter).await?;
    let total = PhoneNumberRepo::count_available(&state.pool, &filter).await?;
    let (limit, offset) = resolve_page(filter.limit, filter.offset);

    Ok(Json(DataResponse {
        data: Page {
            items: items.into_iter().map(PhoneNumberListing::from).collect(),
            total,
            limit,
            offset,
        },
    }))
}

/// GET /api/numbers/mine
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<PhoneNumber>>>> {
    let numbers = PhoneNumberRepo::list_for_owner(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: numbers }))
}

/// GET /api/numbers/{id}
///
/// Anyone may view an available number. Other numbers are visible only to
/// their owner and to admins; everyone else gets a 404 so inventory state
/// does not leak.
pub async fn get_number(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PhoneNumberListing>>> {
    let number = PhoneNumberRepo::find_by_id(&state.pool, id)
        .await?
        .filter(|n| can_view(n, auth.as_ref()))
        .ok_or(CoreError::NotFound {
            entity: "PhoneNumber",
            id,
        })?;
    Ok(Json(DataResponse {
        data: number.into(),
    }))
}

fn can_view(number: &PhoneNumber, auth: Option<&AuthUser>) -> bool {
    if number.status == STATUS_AVAILABLE {
        return true;
    }
    match auth {
        Some(user) => user.is_admin() || number.owner_id == Some(user.user_id),
        None => false,
    }
}

/// POST /api/numbers/{id}/release
///
/// Give up an owned number immediately. Its subscription ends now rather
/// than at the period end, any renewal still awaiting payment is abandoned,
/// and the number goes back to inventory.
pub async fn release(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PhoneNumberListing>>> {
    let number = PhoneNumberRepo::find_by_id(&state.pool, id)
        .await?
        .filter(|n| n.owner_id == Some(auth.user_id))
        .ok_or(CoreError::NotFound {
            entity: "PhoneNumber",
            id,
        })?;
    if number.status != STATUS_ASSIGNED {
        return Err(CoreError::Conflict(format!(
            "A {} number cannot be released",
            number.status
        ))
        .into());
    }

    let returned =
        billing::return_to_inventory(&state, &number, STATUS_AVAILABLE, Some(auth.user_id))
            .await?
            .ok_or_else(|| CoreError::Conflict("Number changed state, try again".into()))?;

    AuditRecord::new(action_types::NUMBER_RELEASE)
        .actor(auth.user_id)
        .entity(entity_types::PHONE_NUMBER, id)
        .details(serde_json::json!({
            "number": returned.number.number,
            "subscription_id": returned.ended_subscription.as_ref().map(|s| s.id),
            "abandoned_payments": returned.abandoned_payments,
        }))
        .client(&client)
        .write(&state.pool)
        .await;

    tracing::info!(user_id = auth.user_id, phone_number_id = id, "Number released by owner");

    Ok(Json(DataResponse {
        data: returned.number.into(),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use onenumber_core::phone_number::STATUS_SUSPENDED;
    use onenumber_core::roles::{ROLE_ADMIN, ROLE_CUSTOMER};

    use super::*;

    fn number(status: &str, owner_id: Option<DbId>) -> PhoneNumber {
        PhoneNumber {
            id: 1,
            number: "+2348012345678".into(),
            display_number: "+234 801 234 5678".into(),
            country_code: "234".into(),
            number_type: "mobile".into(),
            vanity_text: None,
            monthly_price: 150_000,
            currency: "NGN".into(),
            status: status.into(),
            reserved_by: None,
            reserved_until: None,
            owner_id,
            assigned_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(id: DbId, role: &str) -> AuthUser {
        AuthUser {
            user_id: id,
            role: role.to_string(),
        }
    }

    #[test]
    fn available_numbers_are_public() {
        assert!(can_view(&number(STATUS_AVAILABLE, None), None));
    }

    #[test]
    fn held_numbers_visible_to_owner_and_admin_only() {
        let n = number(STATUS_SUSPENDED, Some(7));
        assert!(!can_view(&n, None));
        assert!(!can_view(&n, Some(&user(8, ROLE_CUSTOMER))));
        assert!(can_view(&n, Some(&user(7, ROLE_CUSTOMER))));
        assert!(can_view(&n, Some(&user(1, ROLE_ADMIN))));
    }
}
