//! Reconciliation of remote and local status candidates.
//!
//! Several sources can say something about the same test: a graded remote
//! result, a remote in-progress row, and the local snapshot. This module picks
//! exactly one [`ReconciledStatus`] per test id, and does so stably when it is
//! re-run with the same or additional candidates.
//!
//! # Algorithm
//!
//! Candidates are folded into a [`StatusMap`] one at a time. An incoming
//! candidate replaces the current one when:
//!
//! 1. there is no current candidate
//! 2. both are dated and incoming is strictly newer
//! 3. both are dated with the same instant and incoming's status priority is
//!    at least current's (approved > failed > incomplete)
//! 4. only incoming is dated
//! 5. neither is dated and the priority rule of step 3 holds
//!
//! A candidate's date is its completion time, else its update time.
//!
//! Fold order is fixed: remote results, then remote progress rows, then local
//! snapshots. Reversing it changes which candidate wins an equal-priority tie.

use crate::{
    RemoteTestProgress, RemoteTestResult, SessionStatus, TestId, TestSessionSnapshot, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a status candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusSource {
    RemoteResult,
    RemoteProgress,
    Local,
}

/// The single status shown for one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledStatus {
    pub test_id: TestId,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    pub source: StatusSource,
}

impl ReconciledStatus {
    pub fn from_result(result: &RemoteTestResult) -> Self {
        Self {
            test_id: result.test_id.clone(),
            status: SessionStatus::from_passed(result.passed),
            score: Some(result.score),
            total_questions: Some(result.total_questions),
            current_question: None,
            completed_at: Some(result.completed_at),
            updated_at: Some(result.completed_at),
            source: StatusSource::RemoteResult,
        }
    }

    pub fn from_progress(progress: &RemoteTestProgress) -> Self {
        Self {
            test_id: progress.test_id.clone(),
            status: SessionStatus::Incomplete,
            score: None,
            total_questions: None,
            current_question: Some(progress.current_question),
            completed_at: None,
            updated_at: Some(progress.updated_at),
            source: StatusSource::RemoteProgress,
        }
    }

    pub fn from_snapshot(snapshot: &TestSessionSnapshot) -> Self {
        let total = Some(snapshot.question_count() as u32);

        if snapshot.is_terminal() {
            Self {
                test_id: snapshot.test_id.clone(),
                status: snapshot.status,
                score: snapshot.score,
                total_questions: total,
                current_question: None,
                completed_at: snapshot.completed_at,
                updated_at: snapshot.completed_at.or(snapshot.updated_at),
                source: StatusSource::Local,
            }
        } else {
            Self {
                test_id: snapshot.test_id.clone(),
                status: SessionStatus::Incomplete,
                score: None,
                total_questions: total,
                current_question: Some(snapshot.current_question),
                completed_at: None,
                updated_at: snapshot.updated_at,
                source: StatusSource::Local,
            }
        }
    }

    /// Completion time, else update time. `None` means undated.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.completed_at.or(self.updated_at)
    }
}

/// Whether `incoming` should replace `current` for the same test id.
pub fn should_replace(current: Option<&ReconciledStatus>, incoming: &ReconciledStatus) -> bool {
    let Some(current) = current else {
        return true;
    };

    let outranks = incoming.status.priority() >= current.status.priority();

    match (current.timestamp(), incoming.timestamp()) {
        (Some(current_time), Some(incoming_time)) if incoming_time == current_time => outranks,
        (Some(current_time), Some(incoming_time)) => incoming_time > current_time,
        (None, Some(_)) => true,
        (Some(_), None) => false,
        (None, None) => outranks,
    }
}

/// Counts per status, for category badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub approved: usize,
    pub failed: usize,
    pub incomplete: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.approved + self.failed + self.incomplete
    }
}

/// Reconciled status per test id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMap {
    statuses: BTreeMap<TestId, ReconciledStatus>,
}

impl StatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one candidate in. Returns true if it became the current status.
    pub fn upsert(&mut self, incoming: ReconciledStatus) -> bool {
        if !should_replace(self.statuses.get(&incoming.test_id), &incoming) {
            return false;
        }
        self.statuses.insert(incoming.test_id.clone(), incoming);
        true
    }

    pub fn get(&self, test_id: &str) -> Option<&ReconciledStatus> {
        self.statuses.get(test_id)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReconciledStatus> {
        self.statuses.values()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for status in self.statuses.values() {
            match status.status {
                SessionStatus::Approved => summary.approved += 1,
                SessionStatus::Failed => summary.failed += 1,
                SessionStatus::Incomplete => summary.incomplete += 1,
            }
        }
        summary
    }

    pub fn into_inner(self) -> BTreeMap<TestId, ReconciledStatus> {
        self.statuses
    }
}

/// A candidate that lost to a candidate from a different source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub test_id: TestId,
    pub winner: StatusSource,
    pub loser: StatusSource,
}

/// Folds candidates in the fixed source order and records cross-source losses.
#[derive(Debug, Default)]
pub struct Reconciler {
    map: StatusMap,
    conflicts: Vec<Conflict>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing map, e.g. the previous refresh's result.
    pub fn with_map(map: StatusMap) -> Self {
        Self {
            map,
            conflicts: Vec::new(),
        }
    }

    /// Reconcile all sources in order: results, progress, local.
    pub fn reconcile(
        mut self,
        results: &[RemoteTestResult],
        progress: &[RemoteTestProgress],
        local: &[TestSessionSnapshot],
    ) -> (StatusMap, Vec<Conflict>) {
        for result in results {
            self.fold(ReconciledStatus::from_result(result));
        }
        for row in progress {
            self.fold(ReconciledStatus::from_progress(row));
        }
        for snapshot in local {
            self.fold(ReconciledStatus::from_snapshot(snapshot));
        }

        if !self.conflicts.is_empty() {
            tracing::debug!(
                conflicts = self.conflicts.len(),
                "reconciled diverging test status sources"
            );
        }
        (self.map, self.conflicts)
    }

    fn fold(&mut self, incoming: ReconciledStatus) {
        let current_source = self.map.get(&incoming.test_id).map(|c| c.source);
        let incoming_source = incoming.source;
        let test_id = incoming.test_id.clone();
        let replaced = self.map.upsert(incoming);

        match current_source {
            Some(current) if current != incoming_source => {
                let (winner, loser) = if replaced {
                    (incoming_source, current)
                } else {
                    (current, incoming_source)
                };
                tracing::trace!(test_id = %test_id, ?winner, ?loser, "status conflict resolved");
                self.conflicts.push(Conflict {
                    test_id,
                    winner,
                    loser,
                });
            }
            _ => {}
        }
    }
}

/// Reconcile results, progress rows and local snapshots into one map.
pub fn reconcile(
    results: &[RemoteTestResult],
    progress: &[RemoteTestProgress],
    local: &[TestSessionSnapshot],
) -> StatusMap {
    Reconciler::new().reconcile(results, progress, local).0
}
