//! Per-connection delivery channels for dispatching events to sockets.
//!
//! Every connection owns an unbounded mpsc receiver drained by its socket
//! task. Components deliver through `ConnectionHandle`s resolved from the
//! session registry, so a closing socket never blocks a sender.

use tokio::sync::mpsc;

use super::events::ServerEvent;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Address of one live socket: the connection id plus its outbound channel.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: String,
    pub user_id: String,
    sender: EventSender,
}

impl ConnectionHandle {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, sender: EventSender) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            sender,
        }
    }

    /// Queue an event for this connection. Returns false when the socket
    /// task already dropped its receiver, which callers treat as a
    /// disconnect in progress.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }
}
