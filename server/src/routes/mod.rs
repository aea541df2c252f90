//! HTTP route definitions.

mod bank;
mod health;
mod progress;
mod results;
mod status;
mod ws;

use crate::AppState;
use axum::http::HeaderMap;
use axum::Router;
use serde::Deserialize;

/// Header naming the WebSocket connection of the device making a write.
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(bank::routes())
        .merge(progress::routes())
        .merge(results::routes())
        .merge(status::routes())
        .merge(ws::routes())
}

/// `?category=` on listing endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct CategoryQuery {
    pub category: String,
}

/// Connection to leave out when fanning out a write's notification.
pub(crate) fn origin_connection(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CONNECTION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}
