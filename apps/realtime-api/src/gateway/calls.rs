//! Call signaling: ring/answer lifecycle and WebRTC signal relay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;

use crate::models::user::UserSummary;
use crate::store::UserStore;

use super::events::{CallEndReason, CallMediaType, ServerEvent};
use super::registry::SessionRegistry;

/// How long a call may ring before it is ended as unanswered.
pub const RING_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Ringing,
    Ongoing,
}

struct CallSession {
    room_id: String,
    caller_id: String,
    callee_id: String,
    media: CallMediaType,
    status: CallStatus,
    participants: Vec<String>,
    /// Which initiation attempt armed the ring timer. A stale timer whose
    /// attempt no longer matches must not touch a newer call in the same
    /// room.
    attempt: u64,
}

/// Deterministic call room id for a pair of users, independent of who
/// dials.
pub fn call_room_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{first}-{second}")
}

/// Live call sessions keyed by room id.
///
/// A room holds at most one session. Ending a call removes the session
/// atomically, so the end notification goes out exactly once no matter how
/// many teardown paths race.
pub struct CallSessions {
    sessions: DashMap<String, CallSession>,
    attempts: AtomicU64,
    registry: Arc<SessionRegistry>,
    users: Arc<dyn UserStore>,
}

impl CallSessions {
    pub fn new(registry: Arc<SessionRegistry>, users: Arc<dyn UserStore>) -> Self {
        Self {
            sessions: DashMap::new(),
            attempts: AtomicU64::new(0),
            registry,
            users,
        }
    }

    /// Start ringing the callee, or converge on the already-live session
    /// for this pair. Returns the room id either way; the caller gets
    /// `call-initiated` and, for a fresh session, the callee starts
    /// ringing with a no-answer timer armed.
    pub async fn initiate(
        self: &Arc<Self>,
        caller_id: &str,
        callee_id: &str,
        media: CallMediaType,
    ) -> String {
        let room_id = call_room_id(caller_id, callee_id);

        let caller = match self.users.find_by_id(caller_id).await {
            Ok(profile) => UserSummary::from(&profile),
            Err(err) => {
                tracing::warn!(%err, caller_id, "caller lookup failed, dropping call initiation");
                return room_id;
            }
        };

        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let mut created = false;
        self.sessions.entry(room_id.clone()).or_insert_with(|| {
            created = true;
            CallSession {
                room_id: room_id.clone(),
                caller_id: caller_id.to_string(),
                callee_id: callee_id.to_string(),
                media,
                status: CallStatus::Ringing,
                participants: vec![caller_id.to_string()],
                attempt,
            }
        });
        let media = if created {
            media
        } else {
            self.sessions
                .get(&room_id)
                .map(|session| session.media)
                .unwrap_or(media)
        };

        self.registry.send_to_user(
            caller_id,
            &ServerEvent::CallInitiated {
                room_id: room_id.clone(),
                media,
            },
        );

        if created {
            tracing::info!(room_id, caller_id, callee_id, "call ringing");
            self.registry.send_to_user(
                callee_id,
                &ServerEvent::IncomingCall {
                    room_id: room_id.clone(),
                    caller,
                    media,
                },
            );

            let calls = Arc::clone(self);
            let timer_room = room_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(RING_TIMEOUT).await;
                calls.ring_timed_out(&timer_room, attempt);
            });
        }

        room_id
    }

    /// Callee picks up: the ringing session becomes ongoing and both
    /// parties hear about it. Stale or foreign accepts are ignored.
    pub fn accept(&self, room_id: &str, user_id: &str) {
        let notify = match self.sessions.get_mut(room_id) {
            Some(mut session) => {
                if session.status != CallStatus::Ringing || session.callee_id != user_id {
                    None
                } else {
                    session.status = CallStatus::Ongoing;
                    let callee = session.callee_id.clone();
                    if !session.participants.contains(&callee) {
                        session.participants.push(callee);
                    }
                    Some((session.caller_id.clone(), session.callee_id.clone()))
                }
            }
            None => None,
        };

        if let Some((caller_id, callee_id)) = notify {
            tracing::info!(room_id, "call accepted");
            let event = ServerEvent::CallAccepted {
                room_id: room_id.to_string(),
            };
            self.registry.send_to_user(&caller_id, &event);
            self.registry.send_to_user(&callee_id, &event);
        }
    }

    /// Callee declines a ringing call.
    pub fn decline(&self, room_id: &str, user_id: &str) {
        let removed = self.sessions.remove_if(room_id, |_, session| {
            session.status == CallStatus::Ringing && session.callee_id == user_id
        });
        if let Some((_, session)) = removed {
            tracing::info!(room_id, "call declined");
            self.notify_ended(&session, CallEndReason::Declined);
        }
    }

    /// Either party hangs up. Also covers the caller canceling an
    /// unanswered ring.
    pub fn end(&self, room_id: &str, user_id: &str) {
        let removed = self.sessions.remove_if(room_id, |_, session| {
            session.caller_id == user_id || session.callee_id == user_id
        });
        if let Some((_, session)) = removed {
            tracing::info!(room_id, "call ended");
            self.notify_ended(&session, CallEndReason::Ended);
        }
    }

    /// Forward a WebRTC signal to the other party of an ongoing call.
    /// Signals for ringing, ended or foreign rooms are dropped.
    pub fn relay_signal(&self, room_id: &str, sender_id: &str, signal: Value) {
        let target = match self.sessions.get(room_id) {
            Some(session) => {
                if session.status != CallStatus::Ongoing
                    || !session.participants.iter().any(|id| id == sender_id)
                {
                    None
                } else {
                    session
                        .participants
                        .iter()
                        .find(|id| id.as_str() != sender_id)
                        .cloned()
                }
            }
            None => None,
        };

        if let Some(target) = target {
            self.registry.send_to_user(
                &target,
                &ServerEvent::WebrtcSignal {
                    signal,
                    room_id: room_id.to_string(),
                    sender_id: sender_id.to_string(),
                },
            );
        }
    }

    /// Sweep every live call the user is a party to, reporting a
    /// disconnect to whoever is left.
    pub fn end_calls_for(&self, user_id: &str) {
        let affected: Vec<String> = self
            .sessions
            .iter()
            .filter(|session| session.caller_id == user_id || session.callee_id == user_id)
            .map(|session| session.room_id.clone())
            .collect();

        for room_id in affected {
            let removed = self.sessions.remove_if(&room_id, |_, session| {
                session.caller_id == user_id || session.callee_id == user_id
            });
            if let Some((_, session)) = removed {
                tracing::info!(room_id, user_id, "call torn down by disconnect");
                self.notify_ended(&session, CallEndReason::Disconnected);
            }
        }
    }

    pub fn status(&self, room_id: &str) -> Option<CallStatus> {
        self.sessions.get(room_id).map(|session| session.status)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    fn ring_timed_out(&self, room_id: &str, attempt: u64) {
        let removed = self.sessions.remove_if(room_id, |_, session| {
            session.status == CallStatus::Ringing && session.attempt == attempt
        });
        if let Some((_, session)) = removed {
            tracing::info!(room_id, "call unanswered after ring timeout");
            self.notify_ended(&session, CallEndReason::NoAnswer);
        }
    }

    fn notify_ended(&self, session: &CallSession, reason: CallEndReason) {
        let event = ServerEvent::CallEnded {
            reason,
            room_id: session.room_id.clone(),
        };
        self.registry.send_to_user(&session.caller_id, &event);
        if session.callee_id != session.caller_id {
            self.registry.send_to_user(&session.callee_id, &event);
        }
    }
}
