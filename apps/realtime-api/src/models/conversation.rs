use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::user::UserSummary;

/// Persisted two-party conversation descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participant_ids: [String; 2],
    pub last_message_id: Option<i64>,
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_ids.iter().any(|id| id == user_id)
    }

    /// The participant that isn't `user_id`, if `user_id` is a member.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        if !self.has_participant(user_id) {
            return None;
        }
        self.participant_ids
            .iter()
            .map(String::as_str)
            .find(|id| *id != user_id)
    }
}

/// Enriched summary broadcast as `conversation_updated` and returned by the
/// conversation-list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
