use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::middleware::AdminUser;
use bloodlink_shared::types::auth::{AccountStatus, UserRole};
use bloodlink_shared::types::pagination::{Paginated, PaginationParams};
use bloodlink_shared::types::ApiResponse;

use crate::domain::{DonationStatus, RequestStatus, VoluntaryStatus};
use crate::models::{BloodRequest, User, VoluntaryDonation};
use crate::services::admin_service::{self, DashboardStats};
use crate::services::donation_service::{self, DonationWithRequest};
use crate::services::request_service;
use crate::services::voluntary_service::{self, VoluntaryListing};
use crate::AppState;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct UserFilterParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilterParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub status: Option<String>,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 20 }

impl UserFilterParams {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

impl StatusFilterParams {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Parses an optional query-string filter into its enum.
fn parse_filter<T: std::str::FromStr<Err = String>>(value: Option<&str>) -> AppResult<Option<T>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<T>())
        .transpose()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewBody {
    pub admin_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoluntaryReviewBody {
    pub hospital_id: Option<Uuid>,
    pub admin_notes: Option<String>,
}

// --- Users ---

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<UserFilterParams>,
) -> AppResult<Json<ApiResponse<Paginated<User>>>> {
    let role = parse_filter::<UserRole>(filter.role.as_deref())?;
    let status = parse_filter::<AccountStatus>(filter.status.as_deref())?;
    let params = filter.pagination();

    let mut conn = state.db.get()?;
    let (items, total) = admin_service::list_users(&mut conn, role, status, &params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

async fn review_user(state: AppState, admin: AdminUser, user_id: Uuid, approve: bool) -> AppResult<User> {
    let user = {
        let mut conn = state.db.get()?;
        admin_service::review_user(&mut conn, user_id, admin.0.id, approve)?
    };

    if let Err(e) = state.email.send_account_decision(&user.email, &user.full_name, approve).await {
        tracing::warn!(user_id = %user.id, error = %e, "failed to send account decision email");
    }
    Ok(user)
}

pub async fn approve_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = review_user(state, admin, user_id, true).await?;
    Ok(Json(ApiResponse::ok_with_message(user, "account approved")))
}

pub async fn reject_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = review_user(state, admin, user_id, false).await?;
    Ok(Json(ApiResponse::ok_with_message(user, "account rejected")))
}

// --- Blood requests ---

pub async fn list_requests(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilterParams>,
) -> AppResult<Json<ApiResponse<Paginated<BloodRequest>>>> {
    let status = parse_filter::<RequestStatus>(filter.status.as_deref())?;
    let params = filter.pagination();

    let mut conn = state.db.get()?;
    let (items, total) = request_service::list_all(&mut conn, status, &params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

pub async fn approve_request(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(request_id): Path<Uuid>,
    body: Option<Json<ReviewBody>>,
) -> AppResult<Json<ApiResponse<BloodRequest>>> {
    let Json(body) = body.unwrap_or_default();
    let mut conn = state.db.get()?;
    let request = request_service::review(
        &mut conn,
        request_id,
        admin.id,
        request_service::Review::Approve,
        body.admin_notes,
    )?;
    Ok(Json(ApiResponse::ok_with_message(request, "blood request approved")))
}

pub async fn reject_request(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(request_id): Path<Uuid>,
    body: Option<Json<ReviewBody>>,
) -> AppResult<Json<ApiResponse<BloodRequest>>> {
    let Json(body) = body.unwrap_or_default();
    let mut conn = state.db.get()?;
    let request = request_service::review(
        &mut conn,
        request_id,
        admin.id,
        request_service::Review::Reject,
        body.admin_notes,
    )?;
    Ok(Json(ApiResponse::ok_with_message(request, "blood request rejected")))
}

// --- Voluntary donations ---

pub async fn list_voluntary(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilterParams>,
) -> AppResult<Json<ApiResponse<Paginated<VoluntaryListing>>>> {
    let status = parse_filter::<VoluntaryStatus>(filter.status.as_deref())?;
    let params = filter.pagination();

    let mut conn = state.db.get()?;
    let (items, total) = voluntary_service::list_all(&mut conn, status, &params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

pub async fn approve_voluntary(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<VoluntaryReviewBody>>,
) -> AppResult<Json<ApiResponse<VoluntaryDonation>>> {
    let Json(body) = body.unwrap_or_default();
    let mut conn = state.db.get()?;
    let record = voluntary_service::review(
        &mut conn,
        id,
        admin.id,
        voluntary_service::Review::Approve { hospital_id: body.hospital_id },
        body.admin_notes,
    )?;
    Ok(Json(ApiResponse::ok_with_message(record, "voluntary donation approved")))
}

pub async fn reject_voluntary(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewBody>>,
) -> AppResult<Json<ApiResponse<VoluntaryDonation>>> {
    let Json(body) = body.unwrap_or_default();
    let mut conn = state.db.get()?;
    let record = voluntary_service::review(
        &mut conn,
        id,
        admin.id,
        voluntary_service::Review::Reject,
        body.admin_notes,
    )?;
    Ok(Json(ApiResponse::ok_with_message(record, "voluntary donation rejected")))
}

// --- Donations / dashboard ---

pub async fn list_donations(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilterParams>,
) -> AppResult<Json<ApiResponse<Paginated<DonationWithRequest>>>> {
    let status = parse_filter::<DonationStatus>(filter.status.as_deref())?;
    let params = filter.pagination();

    let mut conn = state.db.get()?;
    let (items, total) = donation_service::list_all(&mut conn, status, &params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    let mut conn = state.db.get()?;
    let stats = admin_service::stats(&mut conn)?;
    Ok(Json(ApiResponse::ok(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_means_no_filter() {
        assert_eq!(parse_filter::<RequestStatus>(None).unwrap(), None);
        assert_eq!(parse_filter::<RequestStatus>(Some("")).unwrap(), None);
    }

    #[test]
    fn filters_parse_into_their_enums() {
        assert_eq!(
            parse_filter::<RequestStatus>(Some("in_progress")).unwrap(),
            Some(RequestStatus::InProgress)
        );
        assert_eq!(parse_filter::<UserRole>(Some("hospital")).unwrap(), Some(UserRole::Hospital));
        assert_eq!(
            parse_filter::<AccountStatus>(Some("pending")).unwrap(),
            Some(AccountStatus::Pending)
        );
    }

    #[test]
    fn unknown_filter_is_a_validation_error() {
        let err = parse_filter::<VoluntaryStatus>(Some("maybe")).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn filter_params_fall_back_to_default_pagination() {
        let filter: StatusFilterParams = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        let params = filter.pagination();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit(), 20);
    }
}
