use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ripple_common::id::{prefix, prefixed_ulid};
use ripple_common::snowflake::SnowflakeGenerator;

use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::models::notification::{NewNotification, Notification};
use crate::models::user::UserProfile;

use super::{ChatStore, NotificationStore, ReadOutcome, StoreError, UserStore};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// In-memory user store, seeded by tests and the standalone dev server.
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserProfile>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, user: UserProfile) {
        self.users.lock().insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        self.users
            .lock()
            .get(user_id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn update_presence(
        &self,
        user_id: &str,
        online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut users = self.users.lock();
        let user = match users.get_mut(user_id) {
            Some(user) => user,
            None => return Err(StoreError::NotFound("user")),
        };
        user.is_online = online;
        user.last_seen = last_seen;
        Ok(())
    }

    async fn get_following(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.users
            .lock()
            .get(user_id)
            .map(|user| user.following.clone())
            .ok_or(StoreError::NotFound("user"))
    }
}

// ---------------------------------------------------------------------------
// Conversations and messages
// ---------------------------------------------------------------------------

struct ChatState {
    conversations: HashMap<String, Conversation>,
    messages: BTreeMap<i64, Message>,
}

/// In-memory chat store. Every mutation runs under one lock, so the
/// message insert and its conversation update are a single atomic step.
pub struct MemoryChatStore {
    state: Mutex<ChatState>,
    ids: SnowflakeGenerator,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChatState {
                conversations: HashMap::new(),
                messages: BTreeMap::new(),
            }),
            ids: SnowflakeGenerator::new(0),
        }
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn find_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        self.state
            .lock()
            .conversations
            .get(conversation_id)
            .cloned()
            .ok_or(StoreError::NotFound("conversation"))
    }

    async fn find_or_create_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Conversation, StoreError> {
        let mut state = self.state.lock();
        if let Some(existing) = state
            .conversations
            .values()
            .find(|c| c.has_participant(user_a) && c.has_participant(user_b))
        {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: prefixed_ulid(prefix::CONVERSATION),
            participant_ids: [user_a.to_string(), user_b.to_string()],
            last_message_id: None,
            unread_count: 0,
            created_at: now,
            updated_at: now,
        };
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let state = self.state.lock();
        let mut conversations: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn messages_for(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        // BTreeMap iteration is id-ascending, which is chronological for
        // snowflake ids.
        Ok(self
            .state
            .lock()
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn find_message(&self, message_id: i64) -> Result<Message, StoreError> {
        self.state
            .lock()
            .messages
            .get(&message_id)
            .cloned()
            .ok_or(StoreError::NotFound("message"))
    }

    async fn create_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, StoreError> {
        let mut state = self.state.lock();
        let conversation = match state.conversations.get_mut(conversation_id) {
            Some(conversation) => conversation,
            None => return Err(StoreError::NotFound("conversation")),
        };

        let message = Message {
            id: self.ids.generate(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            read_by: vec![sender_id.to_string()],
            created_at: Utc::now(),
        };

        conversation.last_message_id = Some(message.id);
        conversation.unread_count += 1;
        conversation.updated_at = message.created_at;

        state.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn mark_message_read(
        &self,
        message_id: i64,
        reader_id: &str,
    ) -> Result<ReadOutcome, StoreError> {
        let mut state = self.state.lock();

        let (message, newly_read) = {
            let message = match state.messages.get_mut(&message_id) {
                Some(message) => message,
                None => return Err(StoreError::NotFound("message")),
            };
            let newly_read = !message.read_by_contains(reader_id);
            if newly_read {
                message.read_by.push(reader_id.to_string());
            }
            (message.clone(), newly_read)
        };

        let conversation = match state.conversations.get_mut(&message.conversation_id) {
            Some(conversation) => conversation,
            None => return Err(StoreError::NotFound("conversation")),
        };
        let unread_changed = newly_read && conversation.unread_count > 0;
        if unread_changed {
            conversation.unread_count -= 1;
        }

        Ok(ReadOutcome {
            message,
            conversation: conversation.clone(),
            unread_changed,
        })
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<Conversation, StoreError> {
        let mut state = self.state.lock();

        let conversation = {
            let conversation = match state.conversations.get_mut(conversation_id) {
                Some(conversation) => conversation,
                None => return Err(StoreError::NotFound("conversation")),
            };
            conversation.unread_count = 0;
            conversation.clone()
        };

        for message in state.messages.values_mut() {
            if message.conversation_id == conversation_id
                && message.sender_id != reader_id
                && !message.read_by_contains(reader_id)
            {
                message.read_by.push(reader_id.to_string());
            }
        }

        Ok(conversation)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub struct MemoryNotificationStore {
    notifications: Mutex<Vec<Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let notification = Notification {
            id: prefixed_ulid(prefix::NOTIFICATION),
            receiver_id: new.receiver_id,
            sender_id: new.sender_id,
            kind: new.kind,
            post_id: new.post_id,
            content: new.content,
            read: false,
            created_at: Utc::now(),
        };
        self.notifications.lock().push(notification.clone());
        Ok(notification)
    }

    async fn find_by_id(&self, notification_id: &str) -> Result<Notification, StoreError> {
        self.notifications
            .lock()
            .iter()
            .find(|n| n.id == notification_id)
            .cloned()
            .ok_or(StoreError::NotFound("notification"))
    }

    async fn for_receiver(&self, receiver_id: &str) -> Result<Vec<Notification>, StoreError> {
        // Insertion order is creation order, so newest-first is a reverse
        // scan.
        Ok(self
            .notifications
            .lock()
            .iter()
            .filter(|n| n.receiver_id == receiver_id)
            .cloned()
            .rev()
            .collect())
    }

    async fn mark_read(
        &self,
        notification_id: &str,
        receiver_id: &str,
    ) -> Result<Notification, StoreError> {
        let mut notifications = self.notifications.lock();
        let notification = match notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.receiver_id == receiver_id)
        {
            Some(notification) => notification,
            None => return Err(StoreError::NotFound("notification")),
        };
        notification.read = true;
        Ok(notification.clone())
    }
}
