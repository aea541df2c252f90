//! Snapshot types for persisting and restoring test attempts.
//!
//! A [`TestSessionSnapshot`] is one attempt's progress or outcome. All
//! snapshots of one browser-equivalent scope live together in a
//! [`LocalDocument`], which is what the storage backend actually holds.

use crate::{error::Result, Category, Error, TestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the local document format for future compatibility.
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Status of an attempt. Terminal once approved or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Incomplete,
    Approved,
    Failed,
}

impl SessionStatus {
    /// Tie-break priority: a graded result outranks an in-progress marker.
    pub fn priority(&self) -> u8 {
        match self {
            SessionStatus::Approved => 3,
            SessionStatus::Failed => 2,
            SessionStatus::Incomplete => 1,
        }
    }

    pub fn from_passed(passed: bool) -> Self {
        if passed {
            SessionStatus::Approved
        } else {
            SessionStatus::Failed
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Incomplete)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Incomplete => write!(f, "incomplete"),
            SessionStatus::Approved => write!(f, "approved"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A point-in-time capture of one test attempt.
///
/// Invariants (checked by [`validate`](Self::validate)):
/// - `status == Incomplete` if and only if `completed_at` is absent
/// - `score` is only present on a graded status
/// - `current_question < answers.len()` whenever there are answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSessionSnapshot {
    pub test_id: TestId,
    pub category: Category,
    /// One slot per question; `None` means unanswered
    #[serde(default)]
    pub answers: Vec<Option<String>>,
    #[serde(default)]
    pub current_question: usize,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Stamped by the store on write when left empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining_secs: Option<u32>,
}

impl TestSessionSnapshot {
    /// A fresh, unanswered attempt.
    pub fn new(
        test_id: impl Into<TestId>,
        category: impl Into<Category>,
        question_count: usize,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            category: category.into(),
            answers: vec![None; question_count],
            current_question: 0,
            status: SessionStatus::Incomplete,
            score: None,
            total_questions: None,
            completed_at: None,
            updated_at: None,
            time_remaining_secs: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Number of answered questions.
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    /// Question count as best known: graded total, else answer slots.
    pub fn question_count(&self) -> usize {
        self.total_questions
            .map(|t| t as usize)
            .unwrap_or(self.answers.len())
    }

    /// Check the status/timestamp/score invariants.
    pub fn validate(&self) -> Result<()> {
        match (self.status.is_terminal(), self.completed_at.is_some()) {
            (false, true) => {
                return Err(Error::InvalidSnapshot(format!(
                    "incomplete attempt '{}' has a completion time",
                    self.test_id
                )))
            }
            (true, false) => {
                return Err(Error::InvalidSnapshot(format!(
                    "{} attempt '{}' has no completion time",
                    self.status, self.test_id
                )))
            }
            _ => {}
        }

        if self.score.is_some() && !self.status.is_terminal() {
            return Err(Error::InvalidSnapshot(format!(
                "incomplete attempt '{}' carries a score",
                self.test_id
            )));
        }

        if !self.answers.is_empty() && self.current_question >= self.answers.len() {
            return Err(Error::InvalidSnapshot(format!(
                "current question {} out of range for '{}' ({} questions)",
                self.current_question,
                self.test_id,
                self.answers.len()
            )));
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }
}

/// Every locally persisted snapshot, keyed by test id.
///
/// Uses BTreeMap for deterministic serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDocument {
    pub format_version: u32,
    #[serde(default)]
    pub tests: BTreeMap<TestId, TestSessionSnapshot>,
}

impl Default for LocalDocument {
    fn default() -> Self {
        Self {
            format_version: DOCUMENT_FORMAT_VERSION,
            tests: BTreeMap::new(),
        }
    }
}

impl LocalDocument {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON, rejecting formats newer than this build knows.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if document.format_version > DOCUMENT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported document format version: {} (max supported: {})",
                document.format_version, DOCUMENT_FORMAT_VERSION
            )));
        }

        Ok(document)
    }
}
