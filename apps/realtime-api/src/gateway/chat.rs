//! Conversation service: the message-send pipeline, read receipts and
//! enriched conversation views.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::models::conversation::{Conversation, ConversationView, LastMessage};
use crate::models::message::{Message, MessageView, MAX_CONTENT_LEN};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::user::UserSummary;
use crate::store::{ChatStore, StoreError, UserStore};

use super::events::ServerEvent;
use super::notify::Notifier;
use super::registry::SessionRegistry;
use super::rooms::ConversationRooms;

#[derive(Debug)]
pub enum ChatError {
    EmptyContent,
    ContentTooLong,
    UnknownConversation,
    UnknownUser,
    NotParticipant,
    SelfConversation,
    Store(StoreError),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::EmptyContent => f.write_str("message content is required"),
            ChatError::ContentTooLong => {
                write!(
                    f,
                    "message cannot be longer than {MAX_CONTENT_LEN} characters"
                )
            }
            ChatError::UnknownConversation => f.write_str("conversation not found"),
            ChatError::UnknownUser => f.write_str("user not found"),
            ChatError::NotParticipant => f.write_str("not a participant in this conversation"),
            ChatError::SelfConversation => f.write_str("cannot start a conversation with yourself"),
            ChatError::Store(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChatError::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// `NotFound` on a conversation lookup means the client named a
/// conversation that does not exist; other store errors pass through.
fn conversation_error(err: StoreError) -> ChatError {
    match err {
        StoreError::NotFound(_) => ChatError::UnknownConversation,
        other => ChatError::Store(other),
    }
}

fn preview(content: &str) -> String {
    format!("\"{}...\"", content.chars().take(20).collect::<String>())
}

/// Conversation operations shared by the socket handler and the REST
/// routes. Sends and reads of one conversation are serialized by a
/// per-conversation lock so counter updates and their broadcasts keep
/// their order.
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    users: Arc<dyn UserStore>,
    registry: Arc<SessionRegistry>,
    rooms: Arc<ConversationRooms>,
    notifier: Arc<Notifier>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        users: Arc<dyn UserStore>,
        registry: Arc<SessionRegistry>,
        rooms: Arc<ConversationRooms>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            users,
            registry,
            rooms,
            notifier,
            locks: DashMap::new(),
        }
    }

    /// Validate, persist and fan out one message. The store write is the
    /// commit point: the room broadcast, the receiver's notification and
    /// the summary updates happen only after it succeeds, and their
    /// failures downgrade to log lines.
    pub async fn send_message(
        &self,
        sender_id: &str,
        conversation_id: &str,
        content: &str,
    ) -> Result<Message, ChatError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyContent);
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(ChatError::ContentTooLong);
        }

        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await
            .map_err(conversation_error)?;
        if !conversation.has_participant(sender_id) {
            return Err(ChatError::NotParticipant);
        }

        let message = self
            .store
            .create_message(conversation_id, sender_id, content)
            .await
            .map_err(ChatError::Store)?;

        // Post-commit fan-out. Each step is independent and best-effort.
        match self.users.find_by_id(sender_id).await {
            Ok(sender) => {
                let view = MessageView::from_message(message.clone(), UserSummary::from(&sender));
                self.rooms
                    .broadcast(conversation_id, &ServerEvent::ReceiveMessage(view));
            }
            Err(err) => {
                tracing::warn!(%err, sender_id, "sender lookup failed, room broadcast skipped");
            }
        }

        if let Some(receiver_id) = conversation.other_participant(sender_id) {
            let notification = NewNotification {
                receiver_id: receiver_id.to_string(),
                sender_id: sender_id.to_string(),
                kind: NotificationKind::Message,
                post_id: None,
                content: Some(preview(content)),
            };
            if let Err(err) = self.notifier.notify(notification).await {
                tracing::warn!(%err, "message notification failed");
            }
        }

        if let Err(err) = self.broadcast_conversation_update(conversation_id).await {
            tracing::warn!(%err, conversation_id, "conversation summary broadcast failed");
        }

        Ok(message)
    }

    /// Record a single-message read receipt and announce it to the room.
    /// The conversation summary goes out only when the unread counter
    /// actually moved.
    pub async fn mark_message_read(
        &self,
        reader_id: &str,
        message_id: i64,
        conversation_id: &str,
    ) -> Result<(), ChatError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let outcome = self
            .store
            .mark_message_read(message_id, reader_id)
            .await
            .map_err(ChatError::Store)?;

        if outcome.message.conversation_id != conversation_id {
            tracing::debug!(
                message_id,
                conversation_id,
                "read receipt names the wrong conversation, not announcing"
            );
            return Ok(());
        }

        self.rooms.broadcast(
            conversation_id,
            &ServerEvent::MessageRead {
                message_id: outcome.message.id,
                read_by: outcome.message.read_by.clone(),
            },
        );

        if outcome.unread_changed {
            if let Err(err) = self.broadcast_conversation_update(conversation_id).await {
                tracing::warn!(%err, conversation_id, "conversation summary broadcast failed");
            }
        }
        Ok(())
    }

    /// Mark everything in a conversation read for one participant and
    /// push the fresh summary to both.
    pub async fn mark_conversation_read(
        &self,
        reader_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, ChatError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await
            .map_err(conversation_error)?;
        if !conversation.has_participant(reader_id) {
            return Err(ChatError::NotParticipant);
        }

        let conversation = self
            .store
            .mark_conversation_read(conversation_id, reader_id)
            .await
            .map_err(ChatError::Store)?;

        if let Err(err) = self.broadcast_conversation_update(conversation_id).await {
            tracing::warn!(%err, conversation_id, "conversation summary broadcast failed");
        }
        Ok(conversation)
    }

    /// Open, or find, the conversation between the caller and another
    /// user.
    pub async fn start_conversation(
        &self,
        user_id: &str,
        other_id: &str,
    ) -> Result<Conversation, ChatError> {
        if user_id == other_id {
            return Err(ChatError::SelfConversation);
        }
        self.users
            .find_by_id(other_id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => ChatError::UnknownUser,
                other => ChatError::Store(other),
            })?;
        self.store
            .find_or_create_conversation(user_id, other_id)
            .await
            .map_err(ChatError::Store)
    }

    /// Conversation summaries for a user, most recent first.
    pub async fn conversations_for(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationView>, ChatError> {
        let conversations = self
            .store
            .conversations_for(user_id)
            .await
            .map_err(ChatError::Store)?;
        let mut views = Vec::with_capacity(conversations.len());
        for conversation in &conversations {
            views.push(
                self.conversation_view(conversation)
                    .await
                    .map_err(ChatError::Store)?,
            );
        }
        Ok(views)
    }

    /// Messages of a conversation with senders enriched, oldest first.
    /// Only participants may read.
    pub async fn messages_for(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<MessageView>, ChatError> {
        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await
            .map_err(conversation_error)?;
        if !conversation.has_participant(user_id) {
            return Err(ChatError::NotParticipant);
        }

        let mut senders: HashMap<String, UserSummary> = HashMap::new();
        for participant in &conversation.participant_ids {
            if let Ok(profile) = self.users.find_by_id(participant).await {
                senders.insert(participant.clone(), UserSummary::from(&profile));
            }
        }

        let messages = self
            .store
            .messages_for(conversation_id)
            .await
            .map_err(ChatError::Store)?;
        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            let sender = match senders.get(&message.sender_id) {
                Some(summary) => summary.clone(),
                None => {
                    let profile = self
                        .users
                        .find_by_id(&message.sender_id)
                        .await
                        .map_err(ChatError::Store)?;
                    let summary = UserSummary::from(&profile);
                    senders.insert(message.sender_id.clone(), summary.clone());
                    summary
                }
            };
            views.push(MessageView::from_message(message, sender));
        }
        Ok(views)
    }

    /// Build the enriched summary of one conversation.
    pub async fn conversation_view(
        &self,
        conversation: &Conversation,
    ) -> Result<ConversationView, StoreError> {
        let mut participants = Vec::with_capacity(conversation.participant_ids.len());
        for participant in &conversation.participant_ids {
            let profile = self.users.find_by_id(participant).await?;
            participants.push(UserSummary::from(&profile));
        }

        let last_message = match conversation.last_message_id {
            Some(message_id) => {
                let message = self.store.find_message(message_id).await?;
                Some(LastMessage {
                    id: message.id,
                    content: message.content,
                    created_at: message.created_at,
                })
            }
            None => None,
        };

        Ok(ConversationView {
            id: conversation.id.clone(),
            participants,
            last_message,
            unread_count: conversation.unread_count,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        })
    }

    async fn broadcast_conversation_update(&self, conversation_id: &str) -> Result<(), StoreError> {
        let conversation = self.store.find_conversation(conversation_id).await?;
        let view = self.conversation_view(&conversation).await?;
        for participant in &conversation.participant_ids {
            self.registry
                .send_to_user(participant, &ServerEvent::ConversationUpdated(view.clone()));
        }
        Ok(())
    }

    fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
