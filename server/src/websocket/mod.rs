//! WebSocket support for cross-device change notifications.
//!
//! A signed-in client keeps one connection per device. Whenever a progress
//! row or result of that user changes, the user's other connections are told
//! so they can refresh their listings.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;
