//! Reconciled remote status for a category.

use autotest_engine::{reconcile, HistorySummary, StatusMap, StatusSummary};
use serde::Serialize;
use sqlx::PgPool;

use super::{list_progress, list_results};
use crate::error::Result;

/// Status of every test the user has touched in a category.
///
/// Built from remote rows only; clients fold their local snapshots on top.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStatus {
    pub category: String,
    pub statuses: StatusMap,
    pub summary: StatusSummary,
    pub history: HistorySummary,
}

pub async fn category_status(pool: &PgPool, user_id: &str, category: &str) -> Result<CategoryStatus> {
    let (results, progress) = tokio::try_join!(
        list_results(pool, user_id, category),
        list_progress(pool, user_id, category),
    )?;

    let statuses = reconcile(&results, &progress, &[]);
    let summary = statuses.summary();
    let history = HistorySummary::from_results(&results);

    tracing::trace!(
        user_id = %user_id,
        category = %category,
        tests = statuses.len(),
        "category status reconciled"
    );

    Ok(CategoryStatus {
        category: category.to_string(),
        statuses,
        summary,
        history,
    })
}
