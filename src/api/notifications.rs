use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::auth::AuthenticatedUser;
use super::AppState;
use crate::error::AppResult;
use crate::ledger::models::Notification;

/// List the caller's notifications, newest first
/// GET /notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state.ledger.list_notifications(caller).await?;
    Ok(Json(notifications))
}

/// Mark one of the caller's notifications as read
/// POST /notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .ledger
        .mark_notification_read(notification_id, caller)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
