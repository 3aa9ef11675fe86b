use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};

pub const REQUESTS_TOTAL: &str = "bloodlink_http_requests_total";
pub const REQUEST_DURATION: &str = "bloodlink_http_request_duration_seconds";
pub const SERVER_ERRORS_TOTAL: &str = "bloodlink_http_server_errors_total";

/// Route template (`/requests/:id`) rather than the concrete path, so ids do
/// not end up as label values.
fn route_label(matched_path: Option<&MatchedPath>) -> String {
    matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = route_label(matched_path.as_ref());

    let response = next.run(req).await;

    let status = response.status();
    let labels = [
        ("method", method),
        ("route", route),
        ("status", status_class(status).to_string()),
    ];

    counter!(REQUESTS_TOTAL, &labels).increment(1);
    histogram!(REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());
    if status.is_server_error() {
        counter!(SERVER_ERRORS_TOTAL, &labels).increment(1);
    }

    response
}

pub fn init_metrics() -> anyhow::Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_collapse_into_classes() {
        assert_eq!(status_class(StatusCode::OK), "2xx");
        assert_eq!(status_class(StatusCode::NOT_FOUND), "4xx");
        assert_eq!(status_class(StatusCode::SERVICE_UNAVAILABLE), "5xx");
        assert_eq!(status_class(StatusCode::PERMANENT_REDIRECT), "3xx");
    }

    #[test]
    fn unmatched_requests_share_one_label() {
        assert_eq!(route_label(None), "unmatched");
    }
}
