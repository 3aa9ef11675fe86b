use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::middleware::RequesterUser;
use bloodlink_shared::types::auth::{AuthUser, UserRole};
use bloodlink_shared::types::pagination::{Paginated, PaginationParams};
use bloodlink_shared::types::ApiResponse;

use crate::domain::{BloodType, Lifecycle, RequestStatus, Urgency};
use crate::models::{BloodRequest, Hospital, NewBloodRequest};
use crate::services::request_service::{self, RequestDetail};
use crate::services::profile_service;
use crate::AppState;

// --- Request / Response types ---

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRequestBody {
    #[validate(length(min = 2, max = 120, message = "patient_name must be 2-120 characters"))]
    pub patient_name: String,
    pub blood_type: String,
    #[validate(range(min = 1, max = 10, message = "quantity must be between 1 and 10 units"))]
    pub quantity: i32,
    pub urgency: String,
    /// Defaults to the hospital's own profile for hospital requesters.
    #[validate(length(max = 200, message = "hospital_name must be at most 200 characters"))]
    pub hospital_name: Option<String>,
    #[validate(length(max = 100, message = "city must be at most 100 characters"))]
    pub city: Option<String>,
    #[validate(length(min = 5, max = 30, message = "contact_phone must be 5-30 characters"))]
    pub contact_phone: String,
    pub required_date: Option<NaiveDate>,
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::new(ErrorCode::ValidationError, format!("{field} is required")))
}

impl CreateRequestBody {
    /// Builds the row to insert. Hospitals may omit their own name and city.
    fn into_new_request(
        self,
        requester: &AuthUser,
        hospital: Option<&Hospital>,
        today: NaiveDate,
    ) -> AppResult<NewBloodRequest> {
        let blood_type = self
            .blood_type
            .parse::<BloodType>()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e))?;
        let urgency = self
            .urgency
            .parse::<Urgency>()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e))?;
        if self.required_date.is_some_and(|date| date < today) {
            return Err(AppError::new(ErrorCode::ValidationError, "required_date cannot be in the past"));
        }

        let hospital_name = self.hospital_name.or_else(|| hospital.map(|h| h.hospital_name.clone()));
        let city = self.city.or_else(|| hospital.and_then(|h| h.city.clone()));

        Ok(NewBloodRequest {
            requester_id: requester.id,
            requester_type: requester.role.as_str().to_string(),
            patient_name: self.patient_name.trim().to_string(),
            blood_type: blood_type.as_str().to_string(),
            quantity: self.quantity,
            urgency: urgency.as_str().to_string(),
            hospital_name: required(hospital_name, "hospital_name")?,
            city: required(city, "city")?,
            contact_phone: self.contact_phone.trim().to_string(),
            required_date: self.required_date,
            notes: self.notes,
            is_voluntary: false,
            status: RequestStatus::Pending.as_str().to_string(),
        })
    }
}

// --- Handlers ---

pub async fn create_request(
    State(state): State<AppState>,
    RequesterUser(auth_user): RequesterUser,
    Json(body): Json<CreateRequestBody>,
) -> AppResult<Json<ApiResponse<BloodRequest>>> {
    body.validate()?;
    let mut conn = state.db.get()?;

    let hospital = match auth_user.role {
        UserRole::Hospital => Some(profile_service::hospital_for_user(&mut conn, auth_user.id)?),
        _ => None,
    };
    let new_request = body.into_new_request(&auth_user, hospital.as_ref(), Utc::now().date_naive())?;
    let request = request_service::create(&mut conn, new_request)?;

    Ok(Json(ApiResponse::ok_with_message(
        request,
        "blood request submitted for review",
    )))
}

pub async fn list_my_requests(
    State(state): State<AppState>,
    RequesterUser(auth_user): RequesterUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<BloodRequest>>>> {
    let mut conn = state.db.get()?;
    let (items, total) = request_service::list_mine(&mut conn, auth_user.id, &params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

pub async fn get_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RequestDetail>>> {
    let mut conn = state.db.get()?;
    let detail = request_service::detail(&mut conn, request_id, &auth_user)?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    RequesterUser(auth_user): RequesterUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BloodRequest>>> {
    let mut conn = state.db.get()?;
    let request = request_service::cancel(&mut conn, request_id, &auth_user)?;
    Ok(Json(ApiResponse::ok_with_message(request, "blood request cancelled")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> CreateRequestBody {
        CreateRequestBody {
            patient_name: "Amina K.".into(),
            blood_type: "o-".into(),
            quantity: 2,
            urgency: "critical".into(),
            hospital_name: None,
            city: None,
            contact_phone: "+1 555 0100".into(),
            required_date: None,
            notes: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn hospital(user_id: Uuid) -> Hospital {
        Hospital {
            id: Uuid::new_v4(),
            user_id,
            hospital_name: "St. Mary".into(),
            license_number: "LIC-1".into(),
            address: None,
            city: Some("Lyon".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn hospital_requests_default_to_the_hospital_profile() {
        let user = AuthUser { id: Uuid::new_v4(), role: UserRole::Hospital };
        let profile = hospital(user.id);
        let row = body().into_new_request(&user, Some(&profile), today()).unwrap();

        assert_eq!(row.hospital_name, "St. Mary");
        assert_eq!(row.city, "Lyon");
        assert_eq!(row.requester_type, "hospital");
        assert_eq!(row.blood_type, "O-");
        assert_eq!(row.status, "pending");
        assert!(!row.is_voluntary);
    }

    #[test]
    fn seekers_must_name_the_hospital() {
        let user = AuthUser { id: Uuid::new_v4(), role: UserRole::Seeker };
        let err = body().into_new_request(&user, None, today()).unwrap_err();
        assert_eq!(err.to_string(), "hospital_name is required");

        let mut with_place = body();
        with_place.hospital_name = Some("Central".into());
        with_place.city = Some("Nantes".into());
        let row = with_place.into_new_request(&user, None, today()).unwrap();
        assert_eq!(row.requester_type, "seeker");
    }

    #[test]
    fn past_required_date_is_rejected() {
        let user = AuthUser { id: Uuid::new_v4(), role: UserRole::Hospital };
        let profile = hospital(user.id);
        let mut late = body();
        late.required_date = today().pred_opt();
        let err = late.into_new_request(&user, Some(&profile), today()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn unknown_urgency_is_rejected() {
        let user = AuthUser { id: Uuid::new_v4(), role: UserRole::Hospital };
        let profile = hospital(user.id);
        let mut odd = body();
        odd.urgency = "whenever".into();
        assert!(odd.into_new_request(&user, Some(&profile), today()).is_err());
    }

    #[test]
    fn quantity_is_bounded() {
        let mut req = body();
        req.quantity = 0;
        assert!(req.validate().is_err());
        req.quantity = 11;
        assert!(req.validate().is_err());
        req.quantity = 10;
        assert!(req.validate().is_ok());
        assert!(body().validate().is_ok());
    }

    #[test]
    fn oversized_quantity_from_json_fails_validation() {
        let req: CreateRequestBody = serde_json::from_value(serde_json::json!({
            "patient_name": "Amina K.",
            "blood_type": "O-",
            "quantity": 15,
            "urgency": "high",
            "hospital_name": "Central",
            "city": "Nantes",
            "contact_phone": "+1 555 0100"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn place_names_fit_their_columns() {
        let mut req = body();
        req.hospital_name = Some("h".repeat(201));
        assert!(req.validate().is_err());

        let mut req = body();
        req.city = Some("c".repeat(101));
        assert!(req.validate().is_err());

        let mut req = body();
        req.hospital_name = Some("h".repeat(200));
        req.city = Some("c".repeat(100));
        assert!(req.validate().is_ok());
    }
}
