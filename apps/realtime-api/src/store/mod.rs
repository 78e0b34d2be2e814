use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::models::notification::{NewNotification, Notification};
use crate::models::user::UserProfile;

pub mod memory;

/// Error surfaced by the persistence seams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The named entity does not exist.
    NotFound(&'static str),
    /// The backing store could not complete the operation.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(entity) => write!(f, "{entity} not found"),
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Outcome of recording a single-message read: the updated rows plus whether
/// the conversation's unread counter actually moved.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub message: Message,
    pub conversation: Conversation,
    pub unread_changed: bool,
}

/// Read-mostly view of the user-profile store owned by the wider platform.
///
/// The realtime service only looks profiles up and writes presence back.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<UserProfile, StoreError>;

    /// Persist the online flag and last-seen timestamp for a user.
    async fn update_presence(
        &self,
        user_id: &str,
        online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// IDs of the users this user follows.
    async fn get_following(&self, user_id: &str) -> Result<Vec<String>, StoreError>;
}

/// Persistence seam for conversations and messages.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError>;

    /// Return the conversation between the two users, creating it if absent.
    /// Participant order does not matter.
    async fn find_or_create_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Conversation, StoreError>;

    /// All conversations the user participates in, most recently updated
    /// first.
    async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError>;

    /// Messages of a conversation in chronological order.
    async fn messages_for(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn find_message(&self, message_id: i64) -> Result<Message, StoreError>;

    /// Insert a message and update its conversation in one atomic step:
    /// the last-message pointer moves, the unread counter increments and
    /// the activity timestamp is refreshed. On failure nothing is applied.
    async fn create_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, StoreError>;

    /// Add `reader_id` to the message's read set. The conversation's unread
    /// counter is decremented only when the reader was newly added and the
    /// counter is positive, so repeated reads never drive it negative.
    async fn mark_message_read(
        &self,
        message_id: i64,
        reader_id: &str,
    ) -> Result<ReadOutcome, StoreError>;

    /// Mark every message the other party sent as read by `reader_id` and
    /// reset the conversation's unread counter to zero.
    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<Conversation, StoreError>;
}

/// Persistence seam for notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError>;

    async fn find_by_id(&self, notification_id: &str) -> Result<Notification, StoreError>;

    /// Notifications addressed to the receiver, newest first.
    async fn for_receiver(&self, receiver_id: &str) -> Result<Vec<Notification>, StoreError>;

    /// Mark a notification read. Fails with `NotFound` when the notification
    /// does not exist or belongs to someone else.
    async fn mark_read(
        &self,
        notification_id: &str,
        receiver_id: &str,
    ) -> Result<Notification, StoreError>;
}

#[derive(Debug)]
pub struct PushError(pub String);

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push delivery failed: {}", self.0)
    }
}

impl std::error::Error for PushError {}

/// Hand-off point for web-push delivery when the receiver has no live
/// connection. Production wiring supplies a real sender; the default one
/// only logs.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, subscription: &Value, payload: &Value) -> Result<(), PushError>;
}

/// Default `PushSender` that records the hand-off in the log and drops the
/// payload.
pub struct LogPushSender;

#[async_trait]
impl PushSender for LogPushSender {
    async fn send(&self, subscription: &Value, payload: &Value) -> Result<(), PushError> {
        tracing::info!(
            endpoint = subscription.get("endpoint").and_then(|v| v.as_str()),
            kind = payload.get("type").and_then(|v| v.as_str()),
            "push notification handed off"
        );
        Ok(())
    }
}
