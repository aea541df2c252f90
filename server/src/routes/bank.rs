//! Question bank routes. Definitions are public.

use autotest_engine::TestDefinition;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::error::Result;
use crate::handlers::load_test;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/tests/{test_id}", get(get_test))
}

/// GET /tests/{test_id}
async fn get_test(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<TestDefinition>> {
    let definition = load_test(&state.config.tests_dir, &test_id).await?;
    Ok(Json(definition))
}
