use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::middleware::session_token;
use bloodlink_shared::types::auth::{AuthUser, UserRole};
use bloodlink_shared::types::ApiResponse;

use crate::domain::BloodType;
use crate::models::User;
use crate::services::auth_service::{self, CurrentUser, DonorDetails, HospitalDetails, Registration, RoleDetails};
use crate::services::profile_service;
use crate::AppState;

// --- Register ---

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 2, max = 120, message = "full_name must be 2-120 characters"))]
    pub full_name: String,
    #[validate(length(max = 30, message = "phone is too long"))]
    pub phone: Option<String>,
    pub role: String,

    // donor
    pub blood_type: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 20, message = "gender must be at most 20 characters"))]
    pub gender: Option<String>,
    pub weight_kg: Option<f64>,

    // hospital
    #[validate(length(min = 2, max = 200, message = "hospital_name must be 2-200 characters"))]
    pub hospital_name: Option<String>,
    #[validate(length(min = 2, max = 100, message = "license_number must be 2-100 characters"))]
    pub license_number: Option<String>,

    #[validate(length(max = 100, message = "city must be at most 100 characters"))]
    pub city: Option<String>,
    pub address: Option<String>,
}

fn missing(field: &str, role: UserRole) -> AppError {
    AppError::new(ErrorCode::ValidationError, format!("{field} is required for {role} accounts"))
}

impl RegisterRequest {
    fn role_details(&self) -> AppResult<RoleDetails> {
        let role = self
            .role
            .parse::<UserRole>()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e))?;

        match role {
            UserRole::Admin => Err(AppError::forbidden("admin accounts cannot be self-registered")),
            UserRole::Seeker => Ok(RoleDetails::Seeker),
            UserRole::Donor => {
                let blood_type = self
                    .blood_type
                    .as_deref()
                    .ok_or_else(|| missing("blood_type", role))?
                    .parse::<BloodType>()
                    .map_err(|e| AppError::new(ErrorCode::ValidationError, e))?;
                let date_of_birth = self.date_of_birth.ok_or_else(|| missing("date_of_birth", role))?;
                let weight_kg = self.weight_kg.ok_or_else(|| missing("weight_kg", role))?;
                profile_service::validate_weight(weight_kg)?;

                Ok(RoleDetails::Donor(DonorDetails {
                    blood_type,
                    date_of_birth,
                    gender: self.gender.clone(),
                    weight_kg,
                    city: self.city.clone(),
                    address: self.address.clone(),
                }))
            }
            UserRole::Hospital => Ok(RoleDetails::Hospital(HospitalDetails {
                hospital_name: self.hospital_name.clone().ok_or_else(|| missing("hospital_name", role))?,
                license_number: self.license_number.clone().ok_or_else(|| missing("license_number", role))?,
                address: self.address.clone(),
                city: self.city.clone(),
            })),
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    req.validate()?;
    auth_service::validate_password(&req.password)?;
    let details = req.role_details()?;

    let password_hash = auth_service::hash_password(&req.password)?;
    let mut conn = state.db.get()?;

    let user = auth_service::register(
        &mut conn,
        Registration {
            email: req.email,
            password_hash,
            full_name: req.full_name.trim().to_string(),
            phone: req.phone,
            details,
        },
    )?;

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");

    Ok(Json(ApiResponse::ok_with_message(
        user,
        "registration received, an administrator will review your account",
    )))
}

// --- Login / logout ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db.get()?;

    let invalid = || AppError::new(ErrorCode::InvalidCredentials, "invalid email or password");
    let user = auth_service::find_by_email(&mut conn, &req.email)?.ok_or_else(invalid)?;
    if !auth_service::verify_password(&req.password, &user.password_hash)? {
        return Err(invalid());
    }
    auth_service::ensure_can_log_in(&user)?;

    let role = user.role.parse::<UserRole>().map_err(AppError::internal)?;
    let token = state.sessions.create(user.id, role).await?;
    let current = auth_service::current_user(&mut conn, user.id)?;

    tracing::info!(user_id = %user.id, role = %role, "user logged in");

    Ok((
        jar.add(state.sessions.cookie(token)),
        Json(ApiResponse::ok(current)),
    ))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// Destroys the session behind the cookie, if any, and clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let logged_out = match session_token(&jar) {
        Some(token) => state.sessions.destroy(&token).await?,
        None => false,
    };

    Ok((
        jar.remove(state.sessions.removal_cookie()),
        Json(ApiResponse::ok(LogoutResponse { logged_out })),
    ))
}

// --- Current user ---

pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<CurrentUser>>> {
    let mut conn = state.db.get()?;
    let current = auth_service::current_user(&mut conn, auth_user.id)?;
    Ok(Json(ApiResponse::ok(current)))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db.get()?;
    auth_service::change_password(&mut conn, auth_user.id, &req.current_password, &req.new_password)?;

    tracing::info!(user_id = %auth_user.id, "password changed");
    Ok(Json(ApiResponse::ok_with_message((), "password updated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: &str) -> RegisterRequest {
        RegisterRequest {
            email: "new@example.org".into(),
            password: "blood4life".into(),
            full_name: "New User".into(),
            phone: None,
            role: role.into(),
            blood_type: None,
            date_of_birth: None,
            gender: None,
            weight_kg: None,
            hospital_name: None,
            license_number: None,
            city: None,
            address: None,
        }
    }

    #[test]
    fn seekers_need_no_profile() {
        assert!(matches!(request("seeker").role_details().unwrap(), RoleDetails::Seeker));
    }

    #[test]
    fn donors_must_give_blood_type_birth_date_and_weight() {
        let mut req = request("donor");
        let err = req.role_details().unwrap_err();
        assert_eq!(err.to_string(), "blood_type is required for donor accounts");

        req.blood_type = Some("ab-".into());
        req.date_of_birth = NaiveDate::from_ymd_opt(1995, 4, 2);
        req.weight_kg = Some(61.0);
        match req.role_details().unwrap() {
            RoleDetails::Donor(details) => assert_eq!(details.blood_type, BloodType::AbNeg),
            other => panic!("unexpected details: {other:?}"),
        }
    }

    #[test]
    fn hospitals_must_give_name_and_license() {
        let mut req = request("hospital");
        req.hospital_name = Some("City General".into());
        assert_eq!(
            req.role_details().unwrap_err().to_string(),
            "license_number is required for hospital accounts"
        );
    }

    #[test]
    fn admin_cannot_self_register() {
        let err = request("admin").role_details().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::Forbidden);
    }

    #[test]
    fn unknown_role_is_a_validation_error() {
        let err = request("nurse").role_details().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn email_format_is_validated() {
        let mut req = request("seeker");
        req.email = "not-an-email".into();
        assert!(req.validate().is_err());
        assert!(request("seeker").validate().is_ok());
    }

    #[test]
    fn profile_text_fits_its_columns() {
        let mut req = request("donor");
        req.gender = Some("g".repeat(21));
        assert!(req.validate().is_err());

        let mut req = request("hospital");
        req.city = Some("c".repeat(101));
        assert!(req.validate().is_err());

        let mut req = request("donor");
        req.gender = Some("female".into());
        req.city = Some("Lyon".into());
        assert!(req.validate().is_ok());
    }
}
