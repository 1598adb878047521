//! Notification inbox endpoints. Every query is scoped to the caller.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::store::HISTORY_LIMIT;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::notification::Notification;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", put(mark_all_read))
        .route("/notifications/{notification_id}", delete(delete_notification))
        .route("/notifications/{notification_id}/read", put(mark_read))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Newest notifications first", body = Vec<Notification>),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = state
        .notifications
        .list_for_user(&user.id, HISTORY_LIMIT)
        .await?;
    Ok(Json(notifications))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// Number of notifications that changed from unread to read.
    pub updated: u64,
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/read-all",
    tag = "Notifications",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All notifications marked as read", body = MarkAllReadResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = state.notifications.mark_all_read(&user.id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/{notification_id}/read",
    tag = "Notifications",
    security(("bearer" = [])),
    params(
        ("notification_id" = String, Path, description = "Notification ID"),
    ),
    responses(
        (status = 204, description = "Notification marked as read"),
        (status = 400, description = "Malformed notification ID", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Notification not found", body = ApiErrorBody),
    ),
)]
pub async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let notification_id = parse_notification_id(&notification_id)?;

    if state.notifications.mark_read(&user.id, notification_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Notification not found"))
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{notification_id}",
    tag = "Notifications",
    security(("bearer" = [])),
    params(
        ("notification_id" = String, Path, description = "Notification ID"),
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 400, description = "Malformed notification ID", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Notification not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_notification(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let notification_id = parse_notification_id(&notification_id)?;

    if state
        .notifications
        .delete_one(&user.id, notification_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Notification not found"))
    }
}

fn parse_notification_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid notification ID"))
}
