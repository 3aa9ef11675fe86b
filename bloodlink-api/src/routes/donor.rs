use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::middleware::DonorUser;
use bloodlink_shared::types::pagination::{Paginated, PaginationParams};
use bloodlink_shared::types::ApiResponse;

use crate::domain::eligibility::Eligibility;
use crate::domain::DonationStatus;
use crate::models::{
    BloodRequest, Certificate, Donation, Donor, DonorChanges, HealthProfile, HealthProfileForm, VoluntaryDonation,
};
use crate::services::donation_service::{self, AcceptedDonation, DonationUpdate, DonationWithRequest};
use crate::services::voluntary_service::{self, Submission};
use crate::services::{certificate_service, eligibility_service, profile_service, request_service};
use crate::AppState;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

// --- Matching requests / donations ---

pub async fn matching_requests(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<BloodRequest>>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let (items, total) = request_service::matching_for_donor(&mut conn, &donor, &params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

pub async fn accept_request(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<AcceptedDonation>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let accepted = donation_service::accept(&mut conn, &donor, request_id, today())?;
    Ok(Json(ApiResponse::ok_with_message(accepted, "request accepted, thank you")))
}

pub async fn list_donations(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<DonationWithRequest>>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let (items, total) = donation_service::list_for_donor(&mut conn, donor.id, &params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDonationStatusBody {
    pub status: String,
    pub notes: Option<String>,
}

impl UpdateDonationStatusBody {
    fn next_status(&self) -> AppResult<DonationStatus> {
        self.status
            .parse::<DonationStatus>()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e))
    }
}

pub async fn update_donation_status(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Path(donation_id): Path<Uuid>,
    Json(body): Json<UpdateDonationStatusBody>,
) -> AppResult<Json<ApiResponse<DonationUpdate>>> {
    let next = body.next_status()?;
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let update = donation_service::advance(&mut conn, &donor, donation_id, next, body.notes, today())?;

    let message = match &update.certificate {
        Some(certificate) => format!("donation completed, certificate {} issued", certificate.certificate_number),
        None => format!("donation is now {next}"),
    };
    Ok(Json(ApiResponse::ok_with_message(update, message)))
}

pub async fn cancel_donation(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Path(donation_id): Path<Uuid>,
    body: Option<Json<CancelBody>>,
) -> AppResult<Json<ApiResponse<Donation>>> {
    let Json(body) = body.unwrap_or_default();
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let donation = donation_service::cancel(&mut conn, &donor, donation_id, body.reason)?;
    Ok(Json(ApiResponse::ok_with_message(donation, "donation cancelled")))
}

// --- Eligibility ---

pub async fn eligibility(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
) -> AppResult<Json<ApiResponse<Eligibility>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let report = eligibility_service::report(&mut conn, &donor, today())?;
    Ok(Json(ApiResponse::ok(report)))
}

// --- Profile ---

pub async fn get_profile(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
) -> AppResult<Json<ApiResponse<Donor>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    Ok(Json(ApiResponse::ok(donor)))
}

/// Blood type and date of birth are fixed at registration.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDonorProfileBody {
    #[validate(length(max = 20, message = "gender must be at most 20 characters"))]
    pub gender: Option<String>,
    pub weight_kg: Option<f64>,
    #[validate(length(max = 100, message = "city must be at most 100 characters"))]
    pub city: Option<String>,
    pub address: Option<String>,
    pub is_available: Option<bool>,
}

impl From<UpdateDonorProfileBody> for DonorChanges {
    fn from(body: UpdateDonorProfileBody) -> Self {
        DonorChanges {
            gender: body.gender,
            weight_kg: body.weight_kg,
            city: body.city,
            address: body.address,
            is_available: body.is_available,
            updated_at: Utc::now(),
        }
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Json(body): Json<UpdateDonorProfileBody>,
) -> AppResult<Json<ApiResponse<Donor>>> {
    body.validate()?;
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let donor = profile_service::update_donor(&mut conn, donor.id, &body.into())?;

    tracing::info!(donor_id = %donor.id, "donor profile updated");
    Ok(Json(ApiResponse::ok(donor)))
}

pub async fn get_health_profile(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
) -> AppResult<Json<ApiResponse<Option<HealthProfile>>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let profile = profile_service::health_profile(&mut conn, donor.id)?;
    Ok(Json(ApiResponse::ok(profile)))
}

#[derive(Debug, Deserialize)]
pub struct HealthProfileBody {
    pub hemoglobin: Option<f64>,
    pub systolic_bp: Option<i32>,
    pub diastolic_bp: Option<i32>,
    pub pulse: Option<i32>,
    #[serde(default)]
    pub has_chronic_disease: bool,
    pub chronic_disease_details: Option<String>,
    pub medications: Option<String>,
    pub recent_illness: Option<String>,
    pub last_checkup_date: Option<NaiveDate>,
}

impl HealthProfileBody {
    fn into_form(self, donor_id: Uuid) -> HealthProfileForm {
        HealthProfileForm {
            donor_id,
            hemoglobin: self.hemoglobin,
            systolic_bp: self.systolic_bp,
            diastolic_bp: self.diastolic_bp,
            pulse: self.pulse,
            has_chronic_disease: self.has_chronic_disease,
            chronic_disease_details: self.chronic_disease_details,
            medications: self.medications,
            recent_illness: self.recent_illness,
            last_checkup_date: self.last_checkup_date,
            updated_at: Utc::now(),
        }
    }
}

pub async fn update_health_profile(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Json(body): Json<HealthProfileBody>,
) -> AppResult<Json<ApiResponse<HealthProfile>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let profile = profile_service::save_health_profile(&mut conn, &body.into_form(donor.id))?;

    tracing::info!(donor_id = %donor.id, "health profile saved");
    Ok(Json(ApiResponse::ok(profile)))
}

// --- Voluntary donations ---

pub async fn list_voluntary(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
) -> AppResult<Json<ApiResponse<Vec<VoluntaryDonation>>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let records = voluntary_service::list_for_donor(&mut conn, donor.id)?;
    Ok(Json(ApiResponse::ok(records)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitVoluntaryBody {
    pub hospital_id: Option<Uuid>,
    pub available_date: NaiveDate,
    #[validate(length(max = 50, message = "preferred_time must be at most 50 characters"))]
    pub preferred_time: Option<String>,
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

pub async fn submit_voluntary(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Json(body): Json<SubmitVoluntaryBody>,
) -> AppResult<Json<ApiResponse<VoluntaryDonation>>> {
    body.validate()?;
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let record = voluntary_service::submit(
        &mut conn,
        &donor,
        Submission {
            hospital_id: body.hospital_id,
            available_date: body.available_date,
            preferred_time: body.preferred_time,
            notes: body.notes,
        },
        today(),
    )?;
    Ok(Json(ApiResponse::ok_with_message(
        record,
        "voluntary donation submitted for review",
    )))
}

pub async fn cancel_voluntary(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelBody>>,
) -> AppResult<Json<ApiResponse<VoluntaryDonation>>> {
    let Json(body) = body.unwrap_or_default();
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let record = voluntary_service::cancel_by_donor(&mut conn, &donor, id, body.reason)?;
    Ok(Json(ApiResponse::ok_with_message(record, "voluntary donation cancelled")))
}

// --- Certificates ---

pub async fn list_certificates(
    State(state): State<AppState>,
    DonorUser(auth_user): DonorUser,
) -> AppResult<Json<ApiResponse<Vec<Certificate>>>> {
    let mut conn = state.db.get()?;
    let donor = profile_service::donor_for_user(&mut conn, auth_user.id)?;
    let certificates = certificate_service::list_for_donor(&mut conn, donor.id)?;
    Ok(Json(ApiResponse::ok(certificates)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_status_body_parses_known_states() {
        let body: UpdateDonationStatusBody = serde_json::from_str(r#"{"status":"on_the_way"}"#).unwrap();
        assert_eq!(body.next_status().unwrap(), DonationStatus::OnTheWay);

        let body: UpdateDonationStatusBody = serde_json::from_str(r#"{"status":"teleported"}"#).unwrap();
        assert_eq!(body.next_status().unwrap_err().error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn health_profile_body_defaults_chronic_disease_to_false() {
        let body: HealthProfileBody = serde_json::from_str(r#"{"hemoglobin":13.1}"#).unwrap();
        let donor_id = Uuid::new_v4();
        let form = body.into_form(donor_id);
        assert_eq!(form.donor_id, donor_id);
        assert!(!form.has_chronic_disease);
        assert_eq!(form.hemoglobin, Some(13.1));
        assert_eq!(form.pulse, None);
    }

    #[test]
    fn profile_update_leaves_omitted_fields_alone() {
        let body: UpdateDonorProfileBody = serde_json::from_str(r#"{"is_available":false}"#).unwrap();
        let changes = DonorChanges::from(body);
        assert_eq!(changes.is_available, Some(false));
        assert!(changes.weight_kg.is_none());
        assert!(changes.city.is_none());
    }

    #[test]
    fn cancel_body_is_optional() {
        let body: CancelBody = serde_json::from_str("{}").unwrap();
        assert!(body.reason.is_none());
    }
}
