//! Identity-keyed registry of live connections and presence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

use crate::store::UserStore;

use super::events::ServerEvent;
use super::fanout::{ConnectionHandle, EventSender};

/// Presence and delivery state for one user identity. Entries outlive the
/// last connection so the push subscription and last-seen timestamp remain
/// available while the user is offline.
struct UserEntry {
    connection_ids: Vec<String>,
    push_subscription: Option<Value>,
    last_seen: DateTime<Utc>,
}

/// Shared registry of all socket sessions, keyed by user identity.
///
/// A user is online while at least one connection is attached. Presence
/// transitions are written back to the user store best-effort: a store
/// failure downgrades to a log line and never tears the socket down.
pub struct SessionRegistry {
    users: DashMap<String, UserEntry>,
    connections: DashMap<String, ConnectionHandle>,
    store: Arc<dyn UserStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            users: DashMap::new(),
            connections: DashMap::new(),
            store,
        }
    }

    /// Attach a connection to its user, flipping the user online on their
    /// first live connection.
    pub async fn register(&self, handle: ConnectionHandle) {
        let user_id = handle.user_id.clone();
        let now = Utc::now();
        {
            let mut entry = self
                .users
                .entry(user_id.clone())
                .or_insert_with(|| UserEntry {
                    connection_ids: Vec::new(),
                    push_subscription: None,
                    last_seen: now,
                });
            entry.connection_ids.push(handle.id.clone());
            entry.last_seen = now;
        }
        self.connections.insert(handle.id.clone(), handle);

        if let Err(err) = self.store.update_presence(&user_id, true, now).await {
            tracing::warn!(%err, user_id, "failed to persist online presence");
        }
    }

    /// Detach a connection. The user flips offline when their last
    /// connection goes.
    pub async fn deregister(&self, user_id: &str, connection_id: &str) {
        self.connections.remove(connection_id);

        let now = Utc::now();
        let went_offline = match self.users.get_mut(user_id) {
            Some(mut entry) => {
                entry.connection_ids.retain(|id| id != connection_id);
                entry.last_seen = now;
                entry.connection_ids.is_empty()
            }
            None => false,
        };

        if went_offline {
            if let Err(err) = self.store.update_presence(user_id, false, now).await {
                tracing::warn!(%err, user_id, "failed to persist offline presence");
            }
        }
    }

    /// Refresh liveness on a heartbeat. Store failures are swallowed.
    pub async fn heartbeat(&self, user_id: &str) {
        let now = Utc::now();
        if let Some(mut entry) = self.users.get_mut(user_id) {
            entry.last_seen = now;
        }
        if let Err(err) = self.store.update_presence(user_id, true, now).await {
            tracing::debug!(%err, user_id, "heartbeat presence write failed");
        }
    }

    /// Record the user's web-push subscription. Last writer wins, and the
    /// subscription survives disconnects.
    pub fn register_push_subscription(&self, user_id: &str, subscription: Value) {
        if let Some(mut entry) = self.users.get_mut(user_id) {
            entry.push_subscription = Some(subscription);
        }
    }

    pub fn push_subscription(&self, user_id: &str) -> Option<Value> {
        self.users
            .get(user_id)
            .and_then(|entry| entry.push_subscription.clone())
    }

    /// Delivery channels for every live connection of a user.
    pub fn resolve(&self, user_id: &str) -> Vec<EventSender> {
        match self.users.get(user_id) {
            Some(entry) => entry
                .connection_ids
                .iter()
                .filter_map(|id| self.connections.get(id).map(|handle| handle.sender()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Deliver an event to every live connection of a user. Returns how
    /// many connections accepted it.
    pub fn send_to_user(&self, user_id: &str, event: &ServerEvent) -> usize {
        self.resolve(user_id)
            .into_iter()
            .filter(|sender| sender.send(event.clone()).is_ok())
            .count()
    }

    /// Deliver an event to one specific connection.
    pub fn send_to_connection(&self, connection_id: &str, event: ServerEvent) -> bool {
        match self.connections.get(connection_id) {
            Some(handle) => handle.send(event),
            None => false,
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.users
            .get(user_id)
            .map(|entry| !entry.connection_ids.is_empty())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drop every delivery channel. Socket tasks observe their channel
    /// closing and shut down.
    pub fn drain(&self) {
        self.connections.clear();
        self.users.clear();
    }
}
