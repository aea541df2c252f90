//! Error types for the AutoTest client.

use crate::config::ConfigError;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("engine error: {0}")]
    Engine(#[from] autotest_engine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid test id: {0:?}")]
    InvalidTestId(String),

    #[error("no question bank configured")]
    NoQuestionBank,
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Test ids end up in file names and URL paths.
pub(crate) fn check_test_id(test_id: &str) -> Result<()> {
    let valid = !test_id.is_empty()
        && test_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ClientError::InvalidTestId(test_id.to_string()))
    }
}
