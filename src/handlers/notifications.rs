use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;
use validator::Validate;

use super::extract::{ValidatedJson, ValidatedQuery};
use super::response::{success, ApiResult};
use crate::auth::Actor;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::Notification;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

// GET /notifications
pub async fn list(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedQuery(query): ValidatedQuery<NotificationsQuery>,
) -> ApiResult<Vec<Notification>> {
    let notifications = {
        let db = state.db.lock().unwrap();
        queries::list_notifications(&db, &actor.user_id, query.unread_only)?
    };
    success(notifications)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    #[validate(length(min = 1, message = "notificationId is required"))]
    pub notification_id: String,
}

// POST /notifications/markRead
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<MarkReadRequest>,
) -> ApiResult<Notification> {
    let notification = {
        let db = state.db.lock().unwrap();
        let notification = queries::get_notification(&db, &req.notification_id)?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.user_id != actor.user_id {
            return Err(AppError::Forbidden(
                "You can only update your own notifications".to_string(),
            ));
        }

        queries::mark_notification_read(&db, &notification.id)?;
        Notification {
            read: true,
            ..notification
        }
    };
    success(notification)
}
