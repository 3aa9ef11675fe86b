//! Server-side sessions keyed by an opaque cookie token.
//!
//! The cookie carries a random token; Redis stores the session under the
//! SHA-256 of that token, so a leaked Redis dump cannot be replayed as cookies.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::redis::RedisClient;
use crate::types::auth::{AuthUser, UserRole};

pub const SESSION_COOKIE: &str = "bloodlink_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Uuid,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionData {
    pub fn new(user_id: Uuid, role: UserRole, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            role,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_idle_expired(&self, now: DateTime<Utc>, idle_timeout_secs: u64) -> bool {
        now - self.last_activity > Duration::seconds(idle_timeout_secs as i64)
    }

    pub fn auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.user_id,
            role: self.role,
        }
    }
}

#[derive(Debug)]
pub enum SessionLookup {
    Active(SessionData),
    Expired,
    Missing,
}

#[derive(Clone)]
pub struct SessionStore {
    redis: RedisClient,
    idle_timeout_secs: u64,
    secure_cookie: bool,
}

impl SessionStore {
    pub fn new(redis: RedisClient, idle_timeout_secs: u64, secure_cookie: bool) -> Self {
        Self {
            redis,
            idle_timeout_secs,
            secure_cookie,
        }
    }

    pub fn idle_timeout_secs(&self) -> u64 {
        self.idle_timeout_secs
    }

    pub fn redis(&self) -> &RedisClient {
        &self.redis
    }

    /// Starts a session and returns the token to put in the cookie.
    pub async fn create(&self, user_id: Uuid, role: UserRole) -> Result<String, redis::RedisError> {
        let token = generate_token();
        let data = SessionData::new(user_id, role, Utc::now());
        self.save(&token, &data).await?;
        tracing::debug!(user_id = %user_id, role = %role, "session created");
        Ok(token)
    }

    /// Loads the session and refreshes its activity stamp. Sessions idle for
    /// longer than the timeout are destroyed.
    pub async fn load(&self, token: &str) -> Result<SessionLookup, redis::RedisError> {
        let key = session_key(token);
        let Some(raw) = self.redis.fetch(&key).await? else {
            return Ok(SessionLookup::Missing);
        };

        let mut data: SessionData = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable session");
                self.redis.remove(&key).await?;
                return Ok(SessionLookup::Missing);
            }
        };

        let now = Utc::now();
        if data.is_idle_expired(now, self.idle_timeout_secs) {
            self.redis.remove(&key).await?;
            tracing::debug!(user_id = %data.user_id, "session expired");
            return Ok(SessionLookup::Expired);
        }

        data.last_activity = now;
        self.save(token, &data).await?;
        Ok(SessionLookup::Active(data))
    }

    /// Returns whether a live session was removed.
    pub async fn destroy(&self, token: &str) -> Result<bool, redis::RedisError> {
        self.redis.remove(&session_key(token)).await
    }

    async fn save(&self, token: &str, data: &SessionData) -> Result<(), redis::RedisError> {
        let value = serde_json::to_string(data).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "session serialization", e.to_string()))
        })?;
        self.redis
            .store(&session_key(token), &value, self.idle_timeout_secs)
            .await
    }

    /// Cookie that installs the session token.
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        session_cookie(token, self.idle_timeout_secs, self.secure_cookie)
    }

    /// Cookie to hand to `CookieJar::remove`. Path must match the one set at login.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE).path("/").build()
    }
}

fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn session_key(token: &str) -> String {
    format!("session:{}", hash_token(token))
}

fn session_cookie(token: String, max_age_secs: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age_secs as i64))
        .secure(secure)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timeout_is_measured_from_last_activity() {
        let start = Utc::now();
        let mut session = SessionData::new(Uuid::new_v4(), UserRole::Donor, start);

        assert!(!session.is_idle_expired(start + Duration::seconds(3600), 3600));
        assert!(session.is_idle_expired(start + Duration::seconds(3601), 3600));

        session.last_activity = start + Duration::minutes(50);
        assert!(!session.is_idle_expired(start + Duration::minutes(100), 3600));
    }

    #[test]
    fn tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn session_key_does_not_contain_token() {
        let key = session_key("abc");
        assert!(key.starts_with("session:"));
        assert!(!key.ends_with("abc"));
        assert_eq!(key, format!("session:{}", hash_token("abc")));
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("tok".into(), 3600, false);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(3600)));
        assert_ne!(cookie.secure(), Some(true));

        let rendered = session_cookie("tok".into(), 3600, true).to_string();
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
    }
}
