//! Notification inbox routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use domain::models::Notification;
use shared::pagination::{PageQuery, Paged};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentUser;

/// List the caller's notifications, newest first.
///
/// GET /api/v1/notifications?limit=20&offset=0
pub async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paged<Notification>>, ApiError> {
    let page = state.notifications.list(user.identity.uid, query).await?;
    Ok(Json(page))
}

/// Mark one of the caller's notifications as read. Already-read
/// notifications are returned unchanged.
///
/// POST /api/v1/notifications/:notification_id/read
pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = state
        .notifications
        .mark_read(user.identity.uid, notification_id)
        .await?;
    Ok(Json(notification))
}
