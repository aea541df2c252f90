//! WebSocket upgrade route.
//!
//! Browsers cannot set headers on a WebSocket handshake, so the token may
//! also be passed as `?token=`.

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header::AUTHORIZATION, HeaderMap},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::handle_websocket_connection;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// GET /ws
async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let auth = match query.token.as_deref() {
        Some(token) => AuthUser::from_token(token, &state.config)?,
        None => {
            let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
            AuthUser::from_header(header, &state.config)?
        }
    };

    let pool = state.pool.clone();
    let conn_manager = state.conn_manager.clone();
    Ok(ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, pool, conn_manager, auth.user_id)
    }))
}
