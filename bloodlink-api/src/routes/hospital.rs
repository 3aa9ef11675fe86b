use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::middleware::HospitalUser;
use bloodlink_shared::types::ApiResponse;

use crate::domain::VoluntaryStatus;
use crate::models::{Hospital, HospitalChanges, VoluntaryDonation};
use crate::services::profile_service;
use crate::services::voluntary_service::{self, CompletedVoluntary, VoluntaryListing};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

// --- Profile ---

pub async fn get_profile(
    State(state): State<AppState>,
    HospitalUser(auth_user): HospitalUser,
) -> AppResult<Json<ApiResponse<Hospital>>> {
    let mut conn = state.db.get()?;
    let hospital = profile_service::hospital_for_user(&mut conn, auth_user.id)?;
    Ok(Json(ApiResponse::ok(hospital)))
}

/// The license number is fixed at registration.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateHospitalProfileBody {
    #[validate(length(min = 2, max = 200, message = "hospital_name must be 2-200 characters"))]
    pub hospital_name: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 100, message = "city must be at most 100 characters"))]
    pub city: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    HospitalUser(auth_user): HospitalUser,
    Json(body): Json<UpdateHospitalProfileBody>,
) -> AppResult<Json<ApiResponse<Hospital>>> {
    body.validate()?;
    let mut conn = state.db.get()?;
    let hospital = profile_service::hospital_for_user(&mut conn, auth_user.id)?;
    let changes = HospitalChanges {
        hospital_name: body.hospital_name,
        address: body.address,
        city: body.city,
        updated_at: Utc::now(),
    };
    let hospital = profile_service::update_hospital(&mut conn, hospital.id, &changes)?;

    tracing::info!(hospital_id = %hospital.id, "hospital profile updated");
    Ok(Json(ApiResponse::ok(hospital)))
}

// --- Voluntary donations ---

#[derive(Debug, Deserialize)]
pub struct VoluntaryFilterParams {
    pub status: Option<String>,
}

impl VoluntaryFilterParams {
    fn status(&self) -> AppResult<Option<VoluntaryStatus>> {
        self.status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<VoluntaryStatus>)
            .transpose()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e))
    }
}

pub async fn list_voluntary(
    State(state): State<AppState>,
    HospitalUser(auth_user): HospitalUser,
    Query(filter): Query<VoluntaryFilterParams>,
) -> AppResult<Json<ApiResponse<Vec<VoluntaryListing>>>> {
    let status = filter.status()?;
    let mut conn = state.db.get()?;
    let hospital = profile_service::hospital_for_user(&mut conn, auth_user.id)?;
    let records = voluntary_service::list_for_hospital(&mut conn, hospital.id, status)?;
    Ok(Json(ApiResponse::ok(records)))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleBody {
    pub scheduled_at: DateTime<Utc>,
}

pub async fn schedule_voluntary(
    State(state): State<AppState>,
    HospitalUser(auth_user): HospitalUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ScheduleBody>,
) -> AppResult<Json<ApiResponse<VoluntaryDonation>>> {
    let mut conn = state.db.get()?;
    let hospital = profile_service::hospital_for_user(&mut conn, auth_user.id)?;
    let record = voluntary_service::schedule(&mut conn, &hospital, id, body.scheduled_at, Utc::now())?;
    Ok(Json(ApiResponse::ok_with_message(record, "appointment scheduled")))
}

pub async fn confirm_voluntary(
    State(state): State<AppState>,
    HospitalUser(auth_user): HospitalUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<VoluntaryDonation>>> {
    let mut conn = state.db.get()?;
    let hospital = profile_service::hospital_for_user(&mut conn, auth_user.id)?;
    let record = voluntary_service::confirm(&mut conn, &hospital, id)?;
    Ok(Json(ApiResponse::ok_with_message(record, "appointment confirmed")))
}

pub async fn complete_voluntary(
    State(state): State<AppState>,
    HospitalUser(auth_user): HospitalUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CompletedVoluntary>>> {
    let mut conn = state.db.get()?;
    let hospital = profile_service::hospital_for_user(&mut conn, auth_user.id)?;
    let completed = voluntary_service::complete(&mut conn, &hospital, id, Utc::now().date_naive())?;
    Ok(Json(ApiResponse::ok_with_message(completed, "donation recorded, certificate issued")))
}

pub async fn cancel_voluntary(
    State(state): State<AppState>,
    HospitalUser(auth_user): HospitalUser,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelBody>>,
) -> AppResult<Json<ApiResponse<VoluntaryDonation>>> {
    let Json(body) = body.unwrap_or_default();
    let mut conn = state.db.get()?;
    let hospital = profile_service::hospital_for_user(&mut conn, auth_user.id)?;
    let record = voluntary_service::cancel_by_hospital(&mut conn, &hospital, id, body.reason)?;
    Ok(Json(ApiResponse::ok_with_message(record, "voluntary donation cancelled")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_is_optional() {
        let filter = VoluntaryFilterParams { status: None };
        assert_eq!(filter.status().unwrap(), None);

        let filter = VoluntaryFilterParams { status: Some("scheduled".into()) };
        assert_eq!(filter.status().unwrap(), Some(VoluntaryStatus::Scheduled));

        let filter = VoluntaryFilterParams { status: Some("later".into()) };
        assert!(filter.status().is_err());
    }

    #[test]
    fn schedule_body_reads_rfc3339() {
        let body: ScheduleBody = serde_json::from_str(r#"{"scheduled_at":"2024-06-03T09:30:00Z"}"#).unwrap();
        assert_eq!(body.scheduled_at.to_rfc3339(), "2024-06-03T09:30:00+00:00");
    }

    #[test]
    fn hospital_name_length_is_validated() {
        let body = UpdateHospitalProfileBody {
            hospital_name: Some("X".into()),
            address: None,
            city: None,
        };
        assert!(body.validate().is_err());
    }
}
