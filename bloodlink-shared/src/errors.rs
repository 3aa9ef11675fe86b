use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Account and profile errors
/// - E2xxx: Blood request errors
/// - E3xxx: Donation errors
/// - E4xxx: Voluntary donation errors
/// - E5xxx: Notification errors
/// - E6xxx: Certificate errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,
    SessionExpired,
    InvalidStateTransition,

    // Accounts (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    PasswordTooWeak,
    AccountPending,
    AccountRejected,
    UserNotFound,
    DonorProfileNotFound,
    HospitalProfileNotFound,

    // Requests (E2xxx)
    RequestNotFound,

    // Donations (E3xxx)
    DonationNotFound,
    DonorIneligible,
    IncompatibleBloodType,
    ActiveDonationExists,

    // Voluntary donations (E4xxx)
    VoluntaryDonationNotFound,
    OpenVoluntaryDonationExists,

    // Notifications (E5xxx)
    NotificationNotFound,

    // Certificates (E6xxx)
    CertificateNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0006",
            Self::SessionExpired => "E0007",
            Self::InvalidStateTransition => "E0008",

            // Accounts
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::PasswordTooWeak => "E1003",
            Self::AccountPending => "E1004",
            Self::AccountRejected => "E1005",
            Self::UserNotFound => "E1006",
            Self::DonorProfileNotFound => "E1007",
            Self::HospitalProfileNotFound => "E1008",

            // Requests
            Self::RequestNotFound => "E2001",

            // Donations
            Self::DonationNotFound => "E3001",
            Self::DonorIneligible => "E3002",
            Self::IncompatibleBloodType => "E3003",
            Self::ActiveDonationExists => "E3004",

            // Voluntary donations
            Self::VoluntaryDonationNotFound => "E4001",
            Self::OpenVoluntaryDonationExists => "E4002",

            // Notifications
            Self::NotificationNotFound => "E5001",

            // Certificates
            Self::CertificateNotFound => "E6001",
        }
    }

    /// State conflicts (wrong lifecycle state, duplicate open records) are
    /// client errors and share the 400 status with input validation.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak
            | Self::EmailAlreadyExists | Self::InvalidStateTransition
            | Self::DonorIneligible | Self::IncompatibleBloodType
            | Self::ActiveDonationExists | Self::OpenVoluntaryDonationExists => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::UserNotFound | Self::DonorProfileNotFound
            | Self::HospitalProfileNotFound | Self::RequestNotFound | Self::DonationNotFound
            | Self::VoluntaryDonationNotFound | Self::NotificationNotFound
            | Self::CertificateNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::AccountPending | Self::AccountRejected => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("session store error: {0}")]
    Session(#[from] redis::RedisError),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidStateTransition, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Code of the error as it will be rendered to the client.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            _ => ErrorCode::InternalError,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(code = code.code(), error = %message, "request failed");
                }
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => match err {
                diesel::result::Error::NotFound => (
                    StatusCode::NOT_FOUND,
                    ApiErrorResponse::new("E0003", "resource not found"),
                ),
                _ => {
                    tracing::error!(error = %err, "database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    )
                }
            },
            AppError::Pool(err) => {
                tracing::error!(error = %err, "failed to get db connection");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "database connection error"),
                )
            }
            AppError::Session(err) => {
                tracing::error!(error = %err, "session store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn known_error_renders_envelope() {
        let (status, value) = body_json(AppError::new(
            ErrorCode::RequestNotFound,
            "blood request not found",
        ))
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["success"], false);
        assert_eq!(value["code"], "E2001");
        assert_eq!(value["message"], "blood request not found");
        assert!(value.get("details").is_none());
    }

    #[tokio::test]
    async fn state_conflicts_are_bad_requests() {
        let (status, value) = body_json(AppError::conflict("request is not pending")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["code"], "E0008");

        assert_eq!(
            ErrorCode::OpenVoluntaryDonationExists.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorCode::ActiveDonationExists.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn database_errors_hide_details() {
        let (status, value) = body_json(AppError::Database(
            diesel::result::Error::RollbackTransaction,
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["message"], "database error");

        let (status, _) = body_json(AppError::Database(diesel::result::Error::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn details_are_included_when_present() {
        let (_, value) = body_json(AppError::with_details(
            ErrorCode::DonorIneligible,
            "donor is not eligible",
            serde_json::json!({ "days_remaining": 12 }),
        ))
        .await;
        assert_eq!(value["details"]["days_remaining"], 12);
    }

    #[test]
    fn auth_failures_map_to_401_and_403() {
        assert_eq!(ErrorCode::SessionExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::AccountPending.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::forbidden("nope").error_code(), ErrorCode::Forbidden);
    }
}
