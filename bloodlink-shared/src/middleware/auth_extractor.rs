use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use crate::clients::session::{SessionLookup, SessionStore, SESSION_COOKIE};
use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, UserRole};

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar)
            .ok_or_else(|| AppError::unauthorized("not logged in"))?;

        let sessions = SessionStore::from_ref(state);
        match sessions.load(&token).await? {
            SessionLookup::Active(session) => Ok(session.auth_user()),
            SessionLookup::Expired => Err(AppError::new(
                ErrorCode::SessionExpired,
                "session expired, please log in again",
            )),
            SessionLookup::Missing => Err(AppError::unauthorized("not logged in")),
        }
    }
}

pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

async fn require_role<S>(
    parts: &mut Parts,
    state: &S,
    allowed: &[UserRole],
    message: &'static str,
) -> Result<AuthUser, AppError>
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    let user = AuthUser::from_request_parts(parts, state).await?;
    if !allowed.contains(&user.role) {
        return Err(AppError::new(ErrorCode::Forbidden, message));
    }
    Ok(user)
}

/// Require Admin role
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, &[UserRole::Admin], "admin access required")
            .await
            .map(Self)
    }
}

/// Require Donor role
pub struct DonorUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for DonorUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, &[UserRole::Donor], "donor access required")
            .await
            .map(Self)
    }
}

/// Require Hospital role
pub struct HospitalUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for HospitalUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, &[UserRole::Hospital], "hospital access required")
            .await
            .map(Self)
    }
}

/// Require a role that may open blood requests (seeker or hospital)
pub struct RequesterUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequesterUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(
            parts,
            state,
            &[UserRole::Seeker, UserRole::Hospital],
            "only seekers and hospitals can manage blood requests",
        )
        .await
        .map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    fn jar(values: &[&'static str]) -> CookieJar {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(header::COOKIE, HeaderValue::from_static(value));
        }
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn finds_session_cookie_among_others() {
        let jar = jar(&["theme=dark; bloodlink_session=abc123; lang=en"]);
        assert_eq!(session_token(&jar).as_deref(), Some("abc123"));
    }

    #[test]
    fn checks_every_cookie_header() {
        let jar = jar(&["theme=dark", "bloodlink_session=tok"]);
        assert_eq!(session_token(&jar).as_deref(), Some("tok"));
    }

    #[test]
    fn missing_or_empty_cookie_yields_none() {
        assert!(session_token(&jar(&[])).is_none());
        assert!(session_token(&jar(&["bloodlink_session="])).is_none());
        assert!(session_token(&jar(&["bloodlink_session_old=x"])).is_none());
    }
}
