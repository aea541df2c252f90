//! Health check and identity endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::db;
use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub connections: usize,
}

/// The authenticated caller.
#[derive(Serialize)]
pub struct MeResponse {
    pub id: String,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/me", get(me))
        .route("/", get(root))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_up = db::ping(&state.pool).await;
    Json(HealthResponse {
        status: if database_up { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: if database_up { "up" } else { "down" },
        connections: state.conn_manager.connection_count(),
    })
}

/// GET /me - 401 when the token is missing or invalid.
async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse { id: user.user_id })
}

async fn root() -> &'static str {
    "AutoTest Server"
}
