//! Reconciled category status route.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use super::CategoryQuery;
use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{category_status, CategoryStatus};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/status", get(status_handler))
}

/// GET /status?category=
async fn status_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<CategoryStatus>> {
    let status = category_status(&state.pool, &auth.user_id, &query.category).await?;
    Ok(Json(status))
}
