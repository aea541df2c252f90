//! Result handlers - append-only graded attempts.

use autotest_engine::RemoteTestResult;
use sqlx::PgPool;

use super::check_key;
use crate::db;
use crate::error::{AppError, Result};

/// Validate an incoming result and claim it for the caller.
pub fn prepare_result(user_id: &str, mut result: RemoteTestResult) -> Result<RemoteTestResult> {
    check_key("test id", &result.test_id)?;
    check_key("category", &result.category)?;

    if result.total_questions == 0 {
        return Err(AppError::BadRequest("result without questions".to_string()));
    }
    if result.score > result.total_questions {
        return Err(AppError::BadRequest(format!(
            "score {} exceeds {} questions",
            result.score, result.total_questions
        )));
    }
    if result.total_questions > i32::MAX as u32 {
        return Err(AppError::BadRequest("question count out of range".to_string()));
    }
    if i64::try_from(result.completed_at).is_err() {
        return Err(AppError::BadRequest("completion time out of range".to_string()));
    }

    result.user_id = user_id.to_string();
    Ok(result)
}

/// Append a graded attempt for the caller. Returns the stored row.
pub async fn record_result(
    pool: &PgPool,
    user_id: &str,
    result: RemoteTestResult,
) -> Result<RemoteTestResult> {
    let result = prepare_result(user_id, result)?;
    let id = db::insert_result(pool, &result).await?;

    tracing::info!(
        id,
        user_id = %user_id,
        test_id = %result.test_id,
        score = result.score,
        passed = result.passed,
        mode = result.test_mode.as_str(),
        "result recorded"
    );
    Ok(result)
}

/// The caller's results in a category, newest first.
pub async fn list_results(
    pool: &PgPool,
    user_id: &str,
    category: &str,
) -> Result<Vec<RemoteTestResult>> {
    check_key("category", category)?;
    let rows = db::list_results(pool, user_id, category).await?;
    Ok(rows.into_iter().map(db::StoredResult::into_result).collect())
}
