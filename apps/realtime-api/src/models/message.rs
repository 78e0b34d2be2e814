use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::user::UserSummary;

/// Maximum accepted message length, matching the store-side constraint.
pub const MAX_CONTENT_LEN: usize = 2000;

/// Persisted chat message. The sender is always a member of `read_by`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub read_by: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn read_by_contains(&self, user_id: &str) -> bool {
        self.read_by.iter().any(|id| id == user_id)
    }
}

/// `receive_message` payload: the persisted message with its sender enriched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub conversation_id: String,
    pub sender: UserSummary,
    pub content: String,
    pub read_by: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageView {
    pub fn from_message(message: Message, sender: UserSummary) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender,
            content: message.content,
            read_by: message.read_by,
            created_at: message.created_at,
        }
    }
}
