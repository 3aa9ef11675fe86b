use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::types::auth::{AccountStatus, UserRole};

use crate::domain::BloodType;
use crate::models::{Donor, Hospital, NewDonor, NewHospital, NewUser, User};
use crate::schema::{donors, hospitals, users};
use crate::services::notification_service::{self, entity_data, NotificationKind};

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must be at least 8 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one number"));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one letter"));
    }
    Ok(())
}

/// Gate applied at login: only approved accounts get a session.
pub fn ensure_can_log_in(user: &User) -> AppResult<()> {
    match user.status.parse::<AccountStatus>().map_err(AppError::internal)? {
        AccountStatus::Approved => Ok(()),
        AccountStatus::Pending => Err(AppError::new(
            ErrorCode::AccountPending,
            "account is awaiting administrator approval",
        )),
        AccountStatus::Rejected => Err(AppError::new(
            ErrorCode::AccountRejected,
            "account registration was rejected",
        )),
    }
}

// --- Registration ---

#[derive(Debug)]
pub struct DonorDetails {
    pub blood_type: BloodType,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub weight_kg: f64,
    pub city: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug)]
pub struct HospitalDetails {
    pub hospital_name: String,
    pub license_number: String,
    pub address: Option<String>,
    pub city: Option<String>,
}

/// Role-specific part of a registration.
#[derive(Debug)]
pub enum RoleDetails {
    Donor(DonorDetails),
    Hospital(HospitalDetails),
    Seeker,
}

impl RoleDetails {
    pub fn role(&self) -> UserRole {
        match self {
            Self::Donor(_) => UserRole::Donor,
            Self::Hospital(_) => UserRole::Hospital,
            Self::Seeker => UserRole::Seeker,
        }
    }
}

#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub details: RoleDetails,
}

/// Creates the user and its role profile in one transaction. The account
/// starts `pending` and every admin is told about it.
pub fn register(conn: &mut PgConnection, registration: Registration) -> AppResult<User> {
    let email = registration.email.trim().to_lowercase();
    let role = registration.details.role();

    conn.transaction::<_, AppError, _>(|conn| {
        let exists: i64 = users::table
            .filter(users::email.eq(&email))
            .count()
            .get_result(conn)?;
        if exists > 0 {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
        }

        let user: User = diesel::insert_into(users::table)
            .values(&NewUser {
                email: email.clone(),
                password_hash: registration.password_hash,
                full_name: registration.full_name,
                phone: registration.phone,
                role: role.as_str().to_string(),
                status: AccountStatus::Pending.as_str().to_string(),
            })
            .get_result(conn)?;

        match registration.details {
            RoleDetails::Donor(details) => {
                diesel::insert_into(donors::table)
                    .values(&NewDonor {
                        user_id: user.id,
                        blood_type: details.blood_type.as_str().to_string(),
                        date_of_birth: details.date_of_birth,
                        gender: details.gender,
                        weight_kg: details.weight_kg,
                        city: details.city,
                        address: details.address,
                    })
                    .execute(conn)?;
            }
            RoleDetails::Hospital(details) => {
                let taken: i64 = hospitals::table
                    .filter(hospitals::license_number.eq(&details.license_number))
                    .count()
                    .get_result(conn)?;
                if taken > 0 {
                    return Err(AppError::new(
                        ErrorCode::ValidationError,
                        "a hospital with this license number is already registered",
                    ));
                }
                diesel::insert_into(hospitals::table)
                    .values(&NewHospital {
                        user_id: user.id,
                        hospital_name: details.hospital_name,
                        license_number: details.license_number,
                        address: details.address,
                        city: details.city,
                    })
                    .execute(conn)?;
            }
            RoleDetails::Seeker => {}
        }

        notification_service::notify_admins(
            conn,
            NotificationKind::Registration,
            "New registration",
            &format!("{} registered as {} and is awaiting approval", user.full_name, role),
            Some(entity_data("user", user.id)),
        )?;

        Ok(user)
    })
}

pub fn find_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<User> {
    users::table
        .find(user_id)
        .first::<User>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))
}

pub fn find_by_email(conn: &mut PgConnection, email: &str) -> AppResult<Option<User>> {
    Ok(users::table
        .filter(users::email.eq(email.trim().to_lowercase()))
        .first::<User>(conn)
        .optional()?)
}

pub fn change_password(
    conn: &mut PgConnection,
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
) -> AppResult<()> {
    let user = find_user(conn, user_id)?;
    if !verify_password(current_password, &user.password_hash)? {
        return Err(AppError::new(ErrorCode::InvalidCredentials, "current password is incorrect"));
    }
    validate_password(new_password)?;
    let password_hash = hash_password(new_password)?;

    diesel::update(users::table.find(user_id))
        .set((
            users::password_hash.eq(password_hash),
            users::updated_at.eq(chrono::Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

// --- Current user ---

#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "profile", rename_all = "lowercase")]
pub enum RoleProfile {
    Donor(Donor),
    Hospital(Hospital),
    None,
}

#[derive(Debug, Serialize)]
pub struct CurrentUser {
    pub user: User,
    pub role_profile: RoleProfile,
}

pub fn current_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<CurrentUser> {
    let user = find_user(conn, user_id)?;
    let role_profile = match user.role.parse::<UserRole>().map_err(AppError::internal)? {
        UserRole::Donor => donors::table
            .filter(donors::user_id.eq(user.id))
            .first::<Donor>(conn)
            .optional()?
            .map_or(RoleProfile::None, RoleProfile::Donor),
        UserRole::Hospital => hospitals::table
            .filter(hospitals::user_id.eq(user.id))
            .first::<Hospital>(conn)
            .optional()?
            .map_or(RoleProfile::None, RoleProfile::Hospital),
        UserRole::Admin | UserRole::Seeker => RoleProfile::None,
    };
    Ok(CurrentUser { user, role_profile })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user_with_status(status: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "donor@example.org".into(),
            password_hash: String::new(),
            full_name: "Test Donor".into(),
            phone: None,
            role: "donor".into(),
            status: status.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn weak_passwords_are_rejected() {
        assert!(validate_password("short1").is_err());
        assert!(validate_password("nodigitshere").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("blood4life").is_ok());
    }

    #[test]
    fn only_approved_accounts_log_in() {
        assert!(ensure_can_log_in(&user_with_status("approved")).is_ok());
        assert_eq!(
            ensure_can_log_in(&user_with_status("pending")).unwrap_err().error_code(),
            ErrorCode::AccountPending
        );
        assert_eq!(
            ensure_can_log_in(&user_with_status("rejected")).unwrap_err().error_code(),
            ErrorCode::AccountRejected
        );
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let json = serde_json::to_value(user_with_status("approved")).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "donor@example.org");
    }
}
