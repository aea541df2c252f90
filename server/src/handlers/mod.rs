//! Request handlers. Routes and the WebSocket loop both call into these.

mod bank;
mod progress;
mod results;
mod status;
mod websocket;

pub use bank::*;
pub use progress::*;
pub use results::*;
pub use status::*;
pub use websocket::*;

use crate::error::{AppError, Result};

const MAX_ID_LEN: usize = 128;

/// Test ids and categories name files and rows: no separators, no dots.
pub(crate) fn check_key(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("invalid {}: {:?}", kind, value)))
    }
}
