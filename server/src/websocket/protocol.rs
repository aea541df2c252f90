//! WebSocket message protocol definitions.
//!
//! All messages are JSON objects tagged by `type`. Envelope fields are
//! snake_case; embedded rows keep their camelCase wire format.

use autotest_engine::{
    HistorySummary, RemoteTestProgress, RemoteTestResult, StatusMap, StatusSummary,
};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the reconciled remote status of a category.
    Status {
        category: String,
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    ///
    /// HTTP writes that carry this id in `X-Connection-Id` are not echoed
    /// back to the connection.
    Welcome { connection_id: String },

    /// Response to a status request.
    StatusResponse {
        category: String,
        statuses: StatusMap,
        summary: StatusSummary,
        history: HistorySummary,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// A progress row was created or replaced.
    ProgressChanged { progress: RemoteTestProgress },

    /// A progress row was removed.
    ProgressDeleted {
        test_id: String,
        category: String,
    },

    /// A graded attempt was recorded.
    ResultRecorded { result: RemoteTestResult },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID from the original request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    /// Category the change belongs to, for change notifications.
    pub fn category(&self) -> Option<&str> {
        match self {
            ServerMessage::ProgressChanged { progress } => Some(&progress.category),
            ServerMessage::ProgressDeleted { category, .. } => Some(category),
            ServerMessage::ResultRecorded { result } => Some(&result.category),
            ServerMessage::StatusResponse { category, .. } => Some(category),
            _ => None,
        }
    }
}
