use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use bloodlink_shared::clients::db;
use bloodlink_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

/// Health check that probes Postgres and the session store.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let checks = vec![
        HealthCheck::from_result("postgres", db::ping(&state.db)),
        HealthCheck::from_result("redis", state.sessions.redis().ping().await),
    ];

    let response = HealthResponse::healthy("bloodlink-api", env!("CARGO_PKG_VERSION")).with_checks(checks);
    (http_status(&response.status), Json(response)).into_response()
}

fn http_status(status: &HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unhealthy_is_unavailable() {
        assert_eq!(http_status(&HealthStatus::Healthy), StatusCode::OK);
        assert_eq!(http_status(&HealthStatus::Degraded), StatusCode::OK);
        assert_eq!(http_status(&HealthStatus::Unhealthy), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn failing_dependency_marks_service_unhealthy() {
        let response = HealthResponse::healthy("bloodlink-api", "0.1.0").with_checks(vec![
            HealthCheck::from_result::<String>("postgres", Ok(())),
            HealthCheck::from_result("redis", Err("connection refused")),
        ]);
        assert_eq!(response.status, HealthStatus::Unhealthy);
    }
}
