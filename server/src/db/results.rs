//! Database operations for the test_results table.

use autotest_engine::{RemoteTestResult, TestMode};
use sqlx::{PgPool, Row};

/// A stored result row from the database.
#[derive(Debug)]
pub struct StoredResult {
    #[allow(dead_code)]
    pub id: i64,
    pub user_id: String,
    pub test_id: String,
    pub category: String,
    pub score: i32,
    pub total_questions: i32,
    pub passed: bool,
    pub test_mode: String,
    pub completed_at: i64,
    /// Server insertion time
    #[allow(dead_code)]
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredResult {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredResult {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            test_id: row.try_get("test_id")?,
            category: row.try_get("category")?,
            score: row.try_get("score")?,
            total_questions: row.try_get("total_questions")?,
            passed: row.try_get("passed")?,
            test_mode: row.try_get("test_mode")?,
            completed_at: row.try_get("completed_at")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

/// Stored mode text to [`TestMode`]. Unknown values read as exam.
pub fn parse_test_mode(mode: &str) -> TestMode {
    match mode {
        "study" => TestMode::Study,
        _ => TestMode::Exam,
    }
}

impl StoredResult {
    /// Convert database row to an engine result row.
    pub fn into_result(self) -> RemoteTestResult {
        RemoteTestResult {
            user_id: self.user_id,
            test_id: self.test_id,
            category: self.category,
            score: self.score.max(0) as u32,
            total_questions: self.total_questions.max(0) as u32,
            passed: self.passed,
            completed_at: self.completed_at.max(0) as u64,
            test_mode: parse_test_mode(&self.test_mode),
        }
    }
}

/// Append a graded attempt. Returns the new row id.
pub async fn insert_result(pool: &PgPool, result: &RemoteTestResult) -> Result<i64, sqlx::Error> {
    let inserted: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO test_results (
            user_id, test_id, category, score, total_questions,
            passed, test_mode, completed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(&result.user_id)
    .bind(&result.test_id)
    .bind(&result.category)
    .bind(result.score as i32)
    .bind(result.total_questions as i32)
    .bind(result.passed)
    .bind(result.test_mode.as_str())
    .bind(result.completed_at as i64)
    .fetch_one(pool)
    .await?;

    Ok(inserted.0)
}

/// The user's results in a category, newest first.
pub async fn list_results(
    pool: &PgPool,
    user_id: &str,
    category: &str,
) -> Result<Vec<StoredResult>, sqlx::Error> {
    sqlx::query_as::<_, StoredResult>(
        r#"
        SELECT id, user_id, test_id, category, score, total_questions,
               passed, test_mode, completed_at, recorded_at
        FROM test_results
        WHERE user_id = $1 AND category = $2
        ORDER BY completed_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .bind(category)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_reads_as_exam() {
        assert_eq!(parse_test_mode("study"), TestMode::Study);
        assert_eq!(parse_test_mode("exam"), TestMode::Exam);
        assert_eq!(parse_test_mode("marathon"), TestMode::Exam);
        assert_eq!(parse_test_mode(TestMode::Study.as_str()), TestMode::Study);
    }
}
