//! Socket wire vocabulary: every event either direction carries, as typed
//! variants of the `{"event": ..., "data": ...}` envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::conversation::ConversationView;
use crate::models::message::{Message, MessageView};
use crate::models::notification::{NotificationKind, NotificationView};
use crate::models::user::UserSummary;

// ---------------------------------------------------------------------------
// Shared call vocabulary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallMediaType {
    Audio,
    Video,
}

/// Why a call ended, as reported to both parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallEndReason {
    Declined,
    Ended,
    NoAnswer,
    Disconnected,
}

impl std::fmt::Display for CallEndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CallEndReason::Declined => "declined",
            CallEndReason::Ended => "ended",
            CallEndReason::NoAnswer => "no-answer",
            CallEndReason::Disconnected => "disconnected",
        };
        f.write_str(reason)
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "authenticate")]
    Authenticate { token: String },

    #[serde(rename = "heartbeat")]
    Heartbeat,

    #[serde(rename = "register-push")]
    RegisterPush { subscription: Value },

    #[serde(rename = "initiate-call", rename_all = "camelCase")]
    InitiateCall {
        callee_id: String,
        #[serde(rename = "type")]
        media: CallMediaType,
    },

    #[serde(rename = "accept-call", rename_all = "camelCase")]
    AcceptCall { room_id: String },

    #[serde(rename = "decline-call", rename_all = "camelCase")]
    DeclineCall { room_id: String },

    #[serde(rename = "end-call", rename_all = "camelCase")]
    EndCall { room_id: String },

    #[serde(rename = "webrtc-signal", rename_all = "camelCase")]
    WebrtcSignal {
        room_id: String,
        signal: Value,
        /// Clients echo their own id here; the server trusts the
        /// authenticated identity instead.
        #[serde(default)]
        sender_id: Option<String>,
    },

    #[serde(rename = "join-call-room", rename_all = "camelCase")]
    JoinCallRoom { room_id: String },

    #[serde(rename = "join_conversation", rename_all = "camelCase")]
    JoinConversation { conversation_id: String },

    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing { conversation_id: String },

    #[serde(rename = "stop_typing", rename_all = "camelCase")]
    StopTyping { conversation_id: String },

    #[serde(rename = "mark_message_read", rename_all = "camelCase")]
    MarkMessageRead {
        message_id: i64,
        conversation_id: String,
    },

    #[serde(rename = "mark_conversation_read", rename_all = "camelCase")]
    MarkConversationRead { conversation_id: String },

    #[serde(rename = "send_message")]
    SendMessage {
        conversation: String,
        content: String,
    },

    #[serde(rename = "send_notification", rename_all = "camelCase")]
    SendNotification {
        receiver_id: String,
        #[serde(rename = "type")]
        kind: NotificationKind,
        #[serde(default)]
        post_id: Option<String>,
        #[serde(default)]
        comment_text: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "ready", rename_all = "camelCase")]
    Ready {
        session_id: String,
        user: UserSummary,
        heartbeat_interval: u64,
    },

    #[serde(rename = "call-initiated", rename_all = "camelCase")]
    CallInitiated {
        room_id: String,
        #[serde(rename = "type")]
        media: CallMediaType,
    },

    #[serde(rename = "incoming-call", rename_all = "camelCase")]
    IncomingCall {
        room_id: String,
        caller: UserSummary,
        #[serde(rename = "type")]
        media: CallMediaType,
    },

    #[serde(rename = "call-accepted", rename_all = "camelCase")]
    CallAccepted { room_id: String },

    #[serde(rename = "call-ended", rename_all = "camelCase")]
    CallEnded {
        reason: CallEndReason,
        room_id: String,
    },

    #[serde(rename = "webrtc-signal", rename_all = "camelCase")]
    WebrtcSignal {
        signal: Value,
        room_id: String,
        sender_id: String,
    },

    #[serde(rename = "user_typing")]
    UserTyping,

    #[serde(rename = "user_stop_typing")]
    UserStopTyping,

    #[serde(rename = "message_read", rename_all = "camelCase")]
    MessageRead {
        message_id: i64,
        read_by: Vec<String>,
    },

    #[serde(rename = "receive_message")]
    ReceiveMessage(MessageView),

    #[serde(rename = "conversation_updated")]
    ConversationUpdated(ConversationView),

    #[serde(rename = "new_notification")]
    NewNotification(NotificationView),

    #[serde(rename = "send_message_result")]
    SendMessageResult(SendMessageAck),
}

/// Acknowledgement for `send_message`, delivered only to the sending
/// connection.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendMessageAck {
    pub fn success(message: Message) -> Self {
        Self {
            status: "success",
            message: Some(message),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: None,
            error: Some(error.into()),
        }
    }
}
