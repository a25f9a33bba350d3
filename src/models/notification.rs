use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    LocationError,
    PaymentProcessed,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskAssigned => "task_assigned",
            NotificationKind::LocationError => "location_error",
            NotificationKind::PaymentProcessed => "payment_processed",
            NotificationKind::System => "system",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "task_assigned" => NotificationKind::TaskAssigned,
            "location_error" => NotificationKind::LocationError,
            "payment_processed" => NotificationKind::PaymentProcessed,
            _ => NotificationKind::System,
        }
    }
}
