//! In-memory per-user presence tracking with multi-session support.
//!
//! Presence is per-**user**, not per-session. A user is only considered offline
//! when ALL of their gateway sessions have disconnected past the grace period.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-user presence state.
struct UserPresence {
    /// Current status: "online", "idle", "dnd", or "offline".
    status: String,
    /// Number of active gateway sessions for this user.
    session_count: usize,
    /// Union of community IDs across all sessions.
    communities: HashSet<String>,
    /// When the last status change occurred.
    updated_at: Instant,
    /// Set when `session_count` drops to 0; cleared on reconnect.
    disconnected_at: Option<Instant>,
}

/// A user whose grace period has expired and should be broadcast as offline.
pub struct OfflineUser {
    pub user_id: String,
    pub communities: HashSet<String>,
}

/// Thread-safe, DashMap-backed presence registry.
pub struct PresenceRegistry {
    inner: DashMap<String, UserPresence>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Register a session coming online. Increments session_count, merges
    /// communities, and clears any pending disconnect timer.
    ///
    /// Returns the previous status if it changed (so the caller can broadcast).
    pub fn set_online(
        &self,
        user_id: &str,
        communities: &HashSet<String>,
    ) -> Option<String> {
        let mut entry = self.inner.entry(user_id.to_string()).or_insert_with(|| {
            UserPresence {
                status: "online".to_string(),
                session_count: 0,
                communities: HashSet::new(),
                updated_at: Instant::now(),
                disconnected_at: None,
            }
        });

        let prev_status = entry.status.clone();
        entry.session_count += 1;
        entry.communities = entry.communities.union(communities).cloned().collect();
        entry.disconnected_at = None;
        entry.updated_at = Instant::now();

        // Restore to "online" if they were offline; keep "dnd" if they set it.
        if prev_status == "offline" {
            entry.status = "online".to_string();
        }

        let new_status = entry.status.clone();
        if new_status != prev_status {
            Some(prev_status)
        } else {
            None
        }
    }

    /// Update the user's status (client-sent: "online", "idle", "dnd").
    ///
    /// Returns the previous status if it changed.
    pub fn set_status(&self, user_id: &str, status: &str) -> Option<String> {
        let mut entry = self.inner.get_mut(user_id)?;
        let prev = entry.status.clone();
        if prev == status {
            return None;
        }
        entry.status = status.to_string();
        entry.updated_at = Instant::now();
        Some(prev)
    }

    /// Decrement session count when a session disconnects. If count reaches 0,
    /// sets `disconnected_at` so the sweeper can handle the grace period.
    /// No broadcast here — that's the sweeper's job.
    pub fn remove_session(&self, user_id: &str, communities: &HashSet<String>) {
        if let Some(mut entry) = self.inner.get_mut(user_id) {
            entry.session_count = entry.session_count.saturating_sub(1);
            // Merge communities in case this session had different ones.
            entry.communities = entry.communities.union(communities).cloned().collect();
            if entry.session_count == 0 {
                entry.disconnected_at = Some(Instant::now());
            }
        }
    }

    /// Sweep users whose grace period has expired. Returns the list of users
    /// that just went offline so the caller can broadcast.
    ///
    /// Also removes entries that have been offline for > 5 minutes (memory cleanup).
    pub fn sweep_offline(&self, grace_period: Duration) -> Vec<OfflineUser> {
        let now = Instant::now();
        let cleanup_threshold = Duration::from_secs(300); // 5 minutes
        let mut gone_offline = Vec::new();
        let mut to_remove = Vec::new();

        for entry in self.inner.iter() {
            let user_id = entry.key();
            let presence = entry.value();

            if presence.session_count == 0 {
                if let Some(disc_at) = presence.disconnected_at {
                    if now.duration_since(disc_at) > grace_period && presence.status != "offline" {
                        // Grace period expired — will transition to offline.
                        gone_offline.push((
                            user_id.clone(),
                            presence.communities.clone(),
                        ));
                    }
                }

                // Clean up entries that have been offline for a while.
                if presence.status == "offline"
                    && now.duration_since(presence.updated_at) > cleanup_threshold
                {
                    to_remove.push(user_id.clone());
                }
            }
        }

        // Apply offline transitions.
        for (ref uid, _) in &gone_offline {
            if let Some(mut entry) = self.inner.get_mut(uid) {
                entry.status = "offline".to_string();
                entry.disconnected_at = None;
                entry.updated_at = Instant::now();
            }
        }

        // Memory cleanup.
        for uid in to_remove {
            self.inner.remove(&uid);
        }

        gone_offline
            .into_iter()
            .map(|(user_id, communities)| OfflineUser {
                user_id,
                communities,
            })
            .collect()
    }

    /// Get all non-offline users in a given community. Returns `(user_id, status)`.
    pub fn get_online_users(&self, community_id: &str) -> Vec<(String, String)> {
        let mut result = Vec::new();
        for entry in self.inner.iter() {
            let presence = entry.value();
            if presence.status != "offline" && presence.communities.contains(community_id) {
                result.push((entry.key().clone(), presence.status.clone()));
            }
        }
        result
    }

    /// Get the current status for a user, if tracked.
    pub fn get_status(&self, user_id: &str) -> Option<String> {
        self.inner.get(user_id).map(|e| e.status.clone())
    }
}
