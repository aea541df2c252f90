//! WebSocket connection loop.
//!
//! Registers the connection under its user, forwards outgoing messages from a
//! channel, and answers status and ping requests until the socket closes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use sqlx::PgPool;
use tokio::sync::mpsc;

use super::category_status;
use crate::websocket::{ClientMessage, ConnectionManager, ServerMessage};

/// Serve an upgraded socket for `user_id` until it closes.
pub async fn handle_websocket_connection(
    socket: WebSocket,
    pool: PgPool,
    conn_manager: Arc<ConnectionManager>,
    user_id: String,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let conn_id = conn_manager.register(&user_id, tx);
    conn_manager.send_to(
        &conn_id,
        ServerMessage::Welcome {
            connection_id: conn_id.clone(),
        },
    );

    tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!(error = %e, "failed to send WebSocket message");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize WebSocket message");
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = process_message(&text, &pool, &user_id).await;
                conn_manager.send_to(&conn_id, response);
            }
            Ok(Message::Binary(_)) => {
                conn_manager.send_to(
                    &conn_id,
                    ServerMessage::error("binary messages are not supported", None),
                );
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    conn_manager.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        user_id = %user_id,
        active_connections = conn_manager.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Answer one client message.
async fn process_message(text: &str, pool: &PgPool, user_id: &str) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::error(format!("Invalid message format: {}", e), None);
        }
    };

    match client_msg {
        ClientMessage::Status {
            category,
            request_id,
        } => match category_status(pool, user_id, &category).await {
            Ok(status) => ServerMessage::StatusResponse {
                category: status.category,
                statuses: status.statuses,
                summary: status.summary,
                history: status.history,
                request_id,
            },
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },
        ClientMessage::Ping => ServerMessage::Pong,
    }
}
