pub mod calls;
pub mod chat;
pub mod events;
pub mod fanout;
pub mod notify;
pub mod registry;
pub mod rooms;
pub mod session;
