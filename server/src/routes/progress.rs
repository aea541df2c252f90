//! Progress routes. Every write is announced to the user's other devices.

use autotest_engine::RemoteTestProgress;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};

use super::{origin_connection, CategoryQuery};
use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers;
use crate::websocket::ServerMessage;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(list_handler))
        .route(
            "/progress/{test_id}",
            get(get_handler).put(put_handler).delete(delete_handler),
        )
}

/// GET /progress?category= - the caller's rows in a category.
async fn list_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<RemoteTestProgress>>> {
    let rows = handlers::list_progress(&state.pool, &auth.user_id, &query.category).await?;
    Ok(Json(rows))
}

/// GET /progress/{test_id} - the row, or `null`.
async fn get_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(test_id): Path<String>,
) -> Result<Json<Option<RemoteTestProgress>>> {
    let row = handlers::get_progress(&state.pool, &auth.user_id, &test_id).await?;
    Ok(Json(row))
}

/// PUT /progress/{test_id}
async fn put_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(test_id): Path<String>,
    headers: HeaderMap,
    Json(progress): Json<RemoteTestProgress>,
) -> Result<Json<RemoteTestProgress>> {
    let saved = handlers::save_progress(&state.pool, &auth.user_id, &test_id, progress).await?;

    state.conn_manager.notify_user(
        &auth.user_id,
        origin_connection(&headers),
        ServerMessage::ProgressChanged {
            progress: saved.clone(),
        },
    );
    Ok(Json(saved))
}

/// DELETE /progress/{test_id} - idempotent.
async fn delete_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(test_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let category = handlers::delete_progress(&state.pool, &auth.user_id, &test_id).await?;

    if let Some(category) = category {
        state.conn_manager.notify_user(
            &auth.user_id,
            origin_connection(&headers),
            ServerMessage::ProgressDeleted { test_id, category },
        );
    }
    Ok(StatusCode::NO_CONTENT)
}
