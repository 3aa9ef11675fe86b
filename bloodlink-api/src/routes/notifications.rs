use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::errors::AppResult;
use bloodlink_shared::types::api::ApiResponse;
use bloodlink_shared::types::auth::AuthUser;
use bloodlink_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::Notification;
use crate::services::notification_service;
use crate::AppState;

/// GET /notifications
/// Newest first, for the authenticated user.
pub async fn list_notifications(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Notification>>>> {
    let mut conn = state.db.get()?;
    let (items, total) = notification_service::list(&mut conn, auth_user.id, &params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let mut conn = state.db.get()?;
    let count = notification_service::count_unread(&mut conn, auth_user.id)?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// POST /notifications/mark-all-read
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let mut conn = state.db.get()?;
    let updated = notification_service::mark_all_read(&mut conn, auth_user.id)?;
    Ok(Json(ApiResponse::ok(MarkAllReadResponse { updated })))
}

/// POST /notifications/:id/read
/// Someone else's notification is reported as not found.
pub async fn mark_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let mut conn = state.db.get()?;
    let notification = notification_service::mark_read(&mut conn, id, auth_user.id)?;
    Ok(Json(ApiResponse::ok(notification)))
}
