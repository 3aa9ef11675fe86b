use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use bloodlink_shared::errors::AppResult;
use bloodlink_shared::types::auth::AuthUser;

use crate::services::certificate_service;
use crate::AppState;

/// GET /certificates/:id
/// Downloads the certificate as a standalone HTML page.
pub async fn download_certificate(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(certificate_id): Path<Uuid>,
) -> AppResult<Response> {
    let view = {
        let mut conn = state.db.get()?;
        certificate_service::load_view(&mut conn, certificate_id, &auth_user)?
    };

    tracing::info!(
        certificate_number = %view.certificate_number,
        user_id = %auth_user.id,
        "certificate downloaded"
    );

    Ok(html_attachment(
        &certificate_service::file_name(&view),
        certificate_service::render_html(&view),
    ))
}

fn html_attachment(file_name: &str, html: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        html,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn attachment_headers_and_body() {
        let response = html_attachment("certificate-BL-20240601-0A1B2C3D.html", "<p>hi</p>".into());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"certificate-BL-20240601-0A1B2C3D.html\""
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<p>hi</p>");
    }
}
