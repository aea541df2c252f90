//! Result routes.

use autotest_engine::RemoteTestResult;
use axum::{
    extract::{Query, State},
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
    Router::new().route("/results", get(list_handler).post(create_handler))
}

/// GET /results?category= - newest first.
async fn list_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<RemoteTestResult>>> {
    let results = handlers::list_results(&state.pool, &auth.user_id, &query.category).await?;
    Ok(Json(results))
}

/// POST /results
async fn create_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(result): Json<RemoteTestResult>,
) -> Result<(StatusCode, Json<RemoteTestResult>)> {
    let recorded = handlers::record_result(&state.pool, &auth.user_id, result).await?;

    state.conn_manager.notify_user(
        &auth.user_id,
        origin_connection(&headers),
        ServerMessage::ResultRecorded {
            result: recorded.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(recorded)))
}
