//! Remote record types: graded results and in-progress rows.

use crate::{Category, TestId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Origin of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Made by this process
    Local,
    /// Observed from another process sharing the same storage
    External,
}

/// How a test attempt was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    /// Practice with no exam pressure
    Study,
    /// Timed exam conditions (default)
    #[default]
    Exam,
}

impl TestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Study => "study",
            TestMode::Exam => "exam",
        }
    }
}

/// A graded attempt. Append-only and immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTestResult {
    pub user_id: UserId,
    pub test_id: TestId,
    pub category: Category,
    pub score: u32,
    pub total_questions: u32,
    pub passed: bool,
    /// When the attempt was finished (milliseconds since epoch)
    pub completed_at: Timestamp,
    #[serde(default)]
    pub test_mode: TestMode,
}

/// An in-progress attempt, one per user and test.
///
/// Answers are sparse: only answered question indices are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTestProgress {
    pub user_id: UserId,
    pub test_id: TestId,
    pub category: Category,
    pub current_question: usize,
    #[serde(default)]
    pub answers: BTreeMap<usize, String>,
    /// Last write (milliseconds since epoch)
    pub updated_at: Timestamp,
}

impl RemoteTestProgress {
    /// Build a progress row from a dense answer list, dropping unset entries.
    pub fn from_answers(
        user_id: impl Into<UserId>,
        test_id: impl Into<TestId>,
        category: impl Into<Category>,
        current_question: usize,
        answers: &[Option<String>],
        updated_at: Timestamp,
    ) -> Self {
        let answers = answers
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.as_ref().map(|a| (i, a.clone())))
            .collect();

        Self {
            user_id: user_id.into(),
            test_id: test_id.into(),
            category: category.into(),
            current_question,
            answers,
            updated_at,
        }
    }

    /// Expand the sparse answers into a dense list of `len` entries.
    ///
    /// Indices at or beyond `len` are ignored.
    pub fn dense_answers(&self, len: usize) -> Vec<Option<String>> {
        let mut dense = vec![None; len];
        for (&index, answer) in &self.answers {
            if let Some(slot) = dense.get_mut(index) {
                *slot = Some(answer.clone());
            }
        }
        dense
    }

    /// True when no question has been answered.
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
