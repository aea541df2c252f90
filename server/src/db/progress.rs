//! Database operations for the test_progress table.

use autotest_engine::RemoteTestProgress;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

/// A stored progress row from the database.
#[derive(Debug)]
pub struct StoredProgress {
    pub user_id: String,
    pub test_id: String,
    pub category: String,
    pub current_question: i32,
    pub answers: BTreeMap<usize, String>,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredProgress {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let Json(answers) = row.try_get::<Json<BTreeMap<usize, String>>, _>("answers")?;
        Ok(StoredProgress {
            user_id: row.try_get("user_id")?,
            test_id: row.try_get("test_id")?,
            category: row.try_get("category")?,
            current_question: row.try_get("current_question")?,
            answers,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredProgress {
    /// Convert database row to an engine progress row.
    pub fn into_progress(self) -> RemoteTestProgress {
        RemoteTestProgress {
            user_id: self.user_id,
            test_id: self.test_id,
            category: self.category,
            current_question: self.current_question.max(0) as usize,
            answers: self.answers,
            updated_at: self.updated_at.max(0) as u64,
        }
    }
}

/// Insert or replace the user's row for a test.
pub async fn upsert_progress(pool: &PgPool, progress: &RemoteTestProgress) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO test_progress (
            user_id, test_id, category, current_question, answers, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, test_id) DO UPDATE SET
            category = EXCLUDED.category,
            current_question = EXCLUDED.current_question,
            answers = EXCLUDED.answers,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&progress.user_id)
    .bind(&progress.test_id)
    .bind(&progress.category)
    // Range-checked by handlers::prepare_progress.
    .bind(progress.current_question as i32)
    .bind(Json(&progress.answers))
    .bind(progress.updated_at as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the user's row for a test.
pub async fn get_progress(
    pool: &PgPool,
    user_id: &str,
    test_id: &str,
) -> Result<Option<StoredProgress>, sqlx::Error> {
    sqlx::query_as::<_, StoredProgress>(
        r#"
        SELECT user_id, test_id, category, current_question, answers, updated_at
        FROM test_progress
        WHERE user_id = $1 AND test_id = $2
        "#,
    )
    .bind(user_id)
    .bind(test_id)
    .fetch_optional(pool)
    .await
}

/// All of the user's rows in a category.
pub async fn list_progress(
    pool: &PgPool,
    user_id: &str,
    category: &str,
) -> Result<Vec<StoredProgress>, sqlx::Error> {
    sqlx::query_as::<_, StoredProgress>(
        r#"
        SELECT user_id, test_id, category, current_question, answers, updated_at
        FROM test_progress
        WHERE user_id = $1 AND category = $2
        ORDER BY test_id ASC
        "#,
    )
    .bind(user_id)
    .bind(category)
    .fetch_all(pool)
    .await
}

/// Delete the user's row for a test.
///
/// Returns the deleted row's category, `None` if there was no row.
pub async fn delete_progress(
    pool: &PgPool,
    user_id: &str,
    test_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let deleted: Option<(String,)> = sqlx::query_as(
        r#"
        DELETE FROM test_progress
        WHERE user_id = $1 AND test_id = $2
        RETURNING category
        "#,
    )
    .bind(user_id)
    .bind(test_id)
    .fetch_optional(pool)
    .await?;

    Ok(deleted.map(|(category,)| category))
}
