//! Result history statistics.

use crate::{RemoteTestResult, Timestamp};
use serde::{Deserialize, Serialize};

/// Aggregate over a user's graded attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub tests_completed: usize,
    pub tests_passed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<Timestamp>,
}

impl HistorySummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a RemoteTestResult>) -> Self {
        results
            .into_iter()
            .fold(Self::default(), |mut summary, result| {
                summary.tests_completed += 1;
                if result.passed {
                    summary.tests_passed += 1;
                }
                summary.best_score = summary.best_score.max(Some(result.score));
                summary.last_completed_at = summary.last_completed_at.max(Some(result.completed_at));
                summary
            })
    }

    /// Share of passed attempts, `0.0` with no attempts.
    pub fn pass_rate(&self) -> f64 {
        if self.tests_completed == 0 {
            return 0.0;
        }
        self.tests_passed as f64 / self.tests_completed as f64
    }
}
