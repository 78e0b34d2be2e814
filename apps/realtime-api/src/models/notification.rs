use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::user::UserSummary;

/// Persisted notification row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub receiver_id: String,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Message,
}

/// Fields supplied by callers when recording a notification. The store fills
/// in the id, the unread flag and the timestamp.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub receiver_id: String,
    pub sender_id: String,
    pub kind: NotificationKind,
    pub post_id: Option<String>,
    pub content: Option<String>,
}

/// `new_notification` payload and notification-list element: the persisted
/// row with its sender enriched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub receiver_id: String,
    pub sender: UserSummary,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationView {
    pub fn from_notification(notification: Notification, sender: UserSummary) -> Self {
        Self {
            id: notification.id,
            receiver_id: notification.receiver_id,
            sender,
            kind: notification.kind,
            post_id: notification.post_id,
            content: notification.content,
            read: notification.read,
            created_at: notification.created_at,
        }
    }
}
