pub mod config;
pub mod domain;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;

use std::sync::Arc;

use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;

use bloodlink_shared::clients::db::DbPool;
use bloodlink_shared::clients::email::EmailClient;
use bloodlink_shared::clients::session::SessionStore;
use bloodlink_shared::errors::AppError;

use config::AppConfig;
use domain::InvalidTransition;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub email: EmailClient,
    pub metrics: Option<PrometheusHandle>,
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::conflict(err.to_string())
    }
}

pub use routes::router;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Lifecycle, RequestStatus};
    use bloodlink_shared::errors::ErrorCode;

    #[test]
    fn invalid_transitions_become_state_conflicts() {
        let err: AppError = RequestStatus::Approved
            .transition(RequestStatus::Approved)
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), ErrorCode::InvalidStateTransition);
        assert_eq!(err.to_string(), "blood request cannot move from 'approved' to 'approved'");
    }
}
