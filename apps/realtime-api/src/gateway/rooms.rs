//! Conversation rooms: socket membership and typing state.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use super::events::ServerEvent;
use super::registry::SessionRegistry;

#[derive(Default)]
struct RoomState {
    member_connections: HashSet<String>,
    typing_user_ids: HashSet<String>,
}

/// Socket membership and typing indicators per conversation.
///
/// A connection is in at most one conversation room at a time; joining a
/// new room implicitly leaves the previous one. Typing markers are keyed
/// by user identity and survive room switches until the user stops typing
/// or disconnects.
pub struct ConversationRooms {
    rooms: DashMap<String, RoomState>,
    /// connection id → the conversation it currently sits in.
    active: DashMap<String, String>,
    registry: Arc<SessionRegistry>,
}

impl ConversationRooms {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            rooms: DashMap::new(),
            active: DashMap::new(),
            registry,
        }
    }

    /// Move a connection into a conversation room.
    pub fn join(&self, connection_id: &str, conversation_id: &str) {
        let previous = self
            .active
            .insert(connection_id.to_string(), conversation_id.to_string());
        if let Some(previous) = previous {
            if previous != conversation_id {
                self.remove_member(&previous, connection_id);
            }
        }
        self.rooms
            .entry(conversation_id.to_string())
            .or_default()
            .member_connections
            .insert(connection_id.to_string());
    }

    /// Record a typing indicator and fan it out to the other members.
    pub fn set_typing(&self, conversation_id: &str, user_id: &str, connection_id: &str) {
        self.rooms
            .entry(conversation_id.to_string())
            .or_default()
            .typing_user_ids
            .insert(user_id.to_string());
        self.broadcast_except(conversation_id, connection_id, &ServerEvent::UserTyping);
    }

    /// Clear a typing indicator. The stop event goes out only when the
    /// user was actually marked typing, so redundant stops stay silent.
    pub fn clear_typing(&self, conversation_id: &str, user_id: &str, connection_id: &str) {
        let removed = self
            .rooms
            .get_mut(conversation_id)
            .map(|mut room| room.typing_user_ids.remove(user_id))
            .unwrap_or(false);
        if removed {
            self.broadcast_except(conversation_id, connection_id, &ServerEvent::UserStopTyping);
            self.cleanup(conversation_id);
        }
    }

    /// Tear down a connection: leave its room and clear the identity's
    /// typing markers everywhere, announcing each stop to the room left
    /// behind.
    pub fn disconnect(&self, connection_id: &str, user_id: &str) {
        if let Some((_, conversation_id)) = self.active.remove(connection_id) {
            self.remove_member(&conversation_id, connection_id);
        }

        let affected: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.typing_user_ids.contains(user_id))
            .map(|entry| entry.key().clone())
            .collect();
        for conversation_id in affected {
            self.clear_typing(&conversation_id, user_id, connection_id);
        }
    }

    /// Deliver an event to every member connection of a room.
    pub fn broadcast(&self, conversation_id: &str, event: &ServerEvent) {
        for connection_id in self.members(conversation_id) {
            self.registry.send_to_connection(&connection_id, event.clone());
        }
    }

    /// Deliver an event to every member except the acting connection.
    pub fn broadcast_except(&self, conversation_id: &str, skip: &str, event: &ServerEvent) {
        for connection_id in self.members(conversation_id) {
            if connection_id != skip {
                self.registry.send_to_connection(&connection_id, event.clone());
            }
        }
    }

    /// Snapshot of a room's member connection ids.
    pub fn members(&self, conversation_id: &str) -> Vec<String> {
        self.rooms
            .get(conversation_id)
            .map(|room| room.member_connections.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Users currently marked typing in a room.
    pub fn typing_users(&self, conversation_id: &str) -> Vec<String> {
        self.rooms
            .get(conversation_id)
            .map(|room| room.typing_user_ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn active_conversation(&self, connection_id: &str) -> Option<String> {
        self.active.get(connection_id).map(|id| id.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_member(&self, conversation_id: &str, connection_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(conversation_id) {
            room.member_connections.remove(connection_id);
        }
        self.cleanup(conversation_id);
    }

    /// Drop the room entry once nothing references it.
    fn cleanup(&self, conversation_id: &str) {
        self.rooms.remove_if(conversation_id, |_, room| {
            room.member_connections.is_empty() && room.typing_user_ids.is_empty()
        });
    }
}
