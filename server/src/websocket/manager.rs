//! WebSocket connection manager.
//!
//! Tracks open connections per user and fans change notifications out to a
//! user's devices.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    pub user_id: String,
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: DashMap<String, Connection>,
    /// Connection ids per user.
    by_user: DashMap<String, Vec<String>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connection for a user. Returns the connection id.
    pub fn register(&self, user_id: &str, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                user_id: user_id.to_string(),
                sender,
            },
        );
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .push(conn_id.clone());

        tracing::debug!(conn_id = %conn_id, user_id = %user_id, "connection registered");
        conn_id
    }

    pub fn unregister(&self, conn_id: &str) {
        let Some((_, conn)) = self.connections.remove(conn_id) else {
            return;
        };

        let now_empty = match self.by_user.get_mut(&conn.user_id) {
            Some(mut ids) => {
                ids.retain(|id| id != conn_id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.by_user.remove_if(&conn.user_id, |_, ids| ids.is_empty());
        }

        tracing::debug!(conn_id = %conn_id, user_id = %conn.user_id, "connection unregistered");
    }

    /// Send to every connection of `user_id` except `except`.
    ///
    /// Returns the number of connections that received the message.
    pub fn notify_user(&self, user_id: &str, except: Option<&str>, message: ServerMessage) -> usize {
        let targets: Vec<String> = match self.by_user.get(user_id) {
            Some(ids) => ids
                .iter()
                .filter(|id| Some(id.as_str()) != except)
                .cloned()
                .collect(),
            None => return 0,
        };

        let sent = targets
            .iter()
            .filter(|id| self.send_to(id, message.clone()))
            .count();

        tracing::debug!(
            user_id = %user_id,
            category = ?message.category(),
            recipients = sent,
            "notified user connections"
        );
        sent
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of users with at least one open connection.
    #[allow(dead_code)]
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}
