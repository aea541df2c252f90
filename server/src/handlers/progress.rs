//! Progress handlers - one in-progress row per user and test.

use autotest_engine::RemoteTestProgress;
use sqlx::PgPool;

use super::check_key;
use crate::db;
use crate::error::{AppError, Result};

/// The user's row for a test, if any.
pub async fn get_progress(
    pool: &PgPool,
    user_id: &str,
    test_id: &str,
) -> Result<Option<RemoteTestProgress>> {
    check_key("test id", test_id)?;
    let stored = db::get_progress(pool, user_id, test_id).await?;
    Ok(stored.map(db::StoredProgress::into_progress))
}

pub async fn list_progress(
    pool: &PgPool,
    user_id: &str,
    category: &str,
) -> Result<Vec<RemoteTestProgress>> {
    check_key("category", category)?;
    let rows = db::list_progress(pool, user_id, category).await?;
    Ok(rows.into_iter().map(db::StoredProgress::into_progress).collect())
}

/// Check an incoming row against the path and the caller, and claim it for
/// the caller.
///
/// A row without answers is rejected; clients delete instead.
pub fn prepare_progress(
    user_id: &str,
    test_id: &str,
    mut progress: RemoteTestProgress,
) -> Result<RemoteTestProgress> {
    check_key("test id", test_id)?;
    check_key("category", &progress.category)?;

    if progress.test_id != test_id {
        return Err(AppError::BadRequest(format!(
            "test id mismatch: path {:?}, body {:?}",
            test_id, progress.test_id
        )));
    }
    if progress.is_empty() {
        return Err(AppError::BadRequest(
            "progress without answers; delete the row instead".to_string(),
        ));
    }
    // Stored as INTEGER and BIGINT.
    if i32::try_from(progress.current_question).is_err() {
        return Err(AppError::BadRequest(format!(
            "current question {} out of range",
            progress.current_question
        )));
    }
    if i64::try_from(progress.updated_at).is_err() {
        return Err(AppError::BadRequest(format!(
            "updated at {} out of range",
            progress.updated_at
        )));
    }

    progress.user_id = user_id.to_string();
    Ok(progress)
}

/// Insert or replace the caller's row. Returns the stored row.
pub async fn save_progress(
    pool: &PgPool,
    user_id: &str,
    test_id: &str,
    progress: RemoteTestProgress,
) -> Result<RemoteTestProgress> {
    let progress = prepare_progress(user_id, test_id, progress)?;
    db::upsert_progress(pool, &progress).await?;

    tracing::debug!(
        user_id = %user_id,
        test_id = %test_id,
        answered = progress.answers.len(),
        "progress saved"
    );
    Ok(progress)
}

/// Delete the caller's row. Returns its category, `None` if it did not exist.
pub async fn delete_progress(pool: &PgPool, user_id: &str, test_id: &str) -> Result<Option<String>> {
    check_key("test id", test_id)?;
    let category = db::delete_progress(pool, user_id, test_id).await?;
    tracing::debug!(user_id = %user_id, test_id = %test_id, existed = category.is_some(), "progress deleted");
    Ok(category)
}
