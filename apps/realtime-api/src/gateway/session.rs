//! Per-connection session state.

/// Identity of a single authenticated WebSocket connection.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    /// Unique connection identifier (`conn_` prefixed ULID). Doubles as the
    /// session id reported in `ready`.
    pub connection_id: String,
    /// Authenticated user ID.
    pub user_id: String,
    /// Authenticated username (cached at handshake time, for logging).
    pub username: String,
}

impl ConnectionSession {
    pub fn new(connection_id: String, user_id: String, username: String) -> Self {
        Self {
            connection_id,
            user_id,
            username,
        }
    }
}
