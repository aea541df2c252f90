//! Sync Scheduler - when to persist the working copy, and where.
//!
//! The scheduler holds at most one pending snapshot. Every change replaces it
//! and restarts the quiet period; the snapshot becomes due once the quiet
//! period passes with no further change. Lifecycle signals bypass the wait
//! with [`SyncScheduler::flush_now`].
//!
//! The scheduler does not own a timer. Callers ask for
//! [`next_deadline`](SyncScheduler::next_deadline), sleep until then, and
//! [`poll`](SyncScheduler::poll).

use crate::{RemoteTestProgress, TestSessionSnapshot, Timestamp};
use serde::{Deserialize, Serialize};

/// Default debounce quiet period.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 400;

/// Why a save happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlushReason {
    /// Quiet period elapsed
    Debounced,
    /// Page or window became hidden
    Hidden,
    /// Navigating away or closing
    Unload,
    /// The session is being torn down
    Teardown,
}

#[derive(Debug, Clone)]
struct PendingSave {
    snapshot: TestSessionSnapshot,
    due_at: Timestamp,
}

/// Debounced autosave state.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    quiet_period_ms: u64,
    pending: Option<PendingSave>,
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD_MS)
    }
}

impl SyncScheduler {
    pub fn new(quiet_period_ms: u64) -> Self {
        Self {
            quiet_period_ms,
            pending: None,
        }
    }

    pub fn quiet_period_ms(&self) -> u64 {
        self.quiet_period_ms
    }

    /// Queue `snapshot`, replacing any pending one and restarting the wait.
    ///
    /// Returns when the snapshot becomes due.
    pub fn schedule(&mut self, snapshot: TestSessionSnapshot, now: Timestamp) -> Timestamp {
        let due_at = now.saturating_add(self.quiet_period_ms);
        self.pending = Some(PendingSave { snapshot, due_at });
        due_at
    }

    /// Take the pending snapshot if its quiet period has passed.
    pub fn poll(&mut self, now: Timestamp) -> Option<TestSessionSnapshot> {
        match &self.pending {
            Some(pending) if pending.due_at <= now => self.pending.take().map(|p| p.snapshot),
            _ => None,
        }
    }

    /// Take the pending snapshot regardless of the quiet period.
    pub fn flush_now(&mut self) -> Option<TestSessionSnapshot> {
        self.pending.take().map(|p| p.snapshot)
    }

    /// Drop the pending snapshot. Returns true if there was one.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.pending.as_ref().map(|p| p.due_at)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// What to do remotely with a saved snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    /// Nobody is signed in, or the attempt is graded (finalize handles it)
    Skip,
    /// Nothing answered: remove any stale row instead of writing an empty one
    DeleteProgress,
    UpsertProgress(RemoteTestProgress),
}

/// Decide the remote side of a save. The local write always happens.
pub fn plan_remote_write(
    snapshot: &TestSessionSnapshot,
    user_id: Option<&str>,
    now: Timestamp,
) -> RemoteWrite {
    let Some(user_id) = user_id else {
        return RemoteWrite::Skip;
    };
    if snapshot.is_terminal() {
        return RemoteWrite::Skip;
    }
    if snapshot.answers.iter().all(Option::is_none) {
        return RemoteWrite::DeleteProgress;
    }

    RemoteWrite::UpsertProgress(RemoteTestProgress::from_answers(
        user_id,
        snapshot.test_id.clone(),
        snapshot.category.clone(),
        snapshot.current_question,
        &snapshot.answers,
        snapshot.updated_at.unwrap_or(now),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionStatus;

    fn snapshot(answered: usize) -> TestSessionSnapshot {
        let mut snapshot = TestSessionSnapshot::new("test1", "B", 5);
        for slot in snapshot.answers.iter_mut().take(answered) {
            *slot = Some("A".into());
        }
        snapshot
    }

    #[test]
    fn nothing_due_before_quiet_period() {
        let mut scheduler = SyncScheduler::new(400);
        assert_eq!(scheduler.schedule(snapshot(1), 1000), 1400);
        assert!(scheduler.poll(1399).is_none());
        assert!(scheduler.is_pending());
        assert!(scheduler.poll(1400).is_some());
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn new_change_restarts_the_wait() {
        let mut scheduler = SyncScheduler::new(400);
        scheduler.schedule(snapshot(1), 1000);
        scheduler.schedule(snapshot(2), 1300);

        assert!(scheduler.poll(1500).is_none());
        assert_eq!(scheduler.next_deadline(), Some(1700));

        let due = scheduler.poll(1700).unwrap();
        assert_eq!(due.answered_count(), 2);
    }

    #[test]
    fn flush_bypasses_the_wait() {
        let mut scheduler = SyncScheduler::new(400);
        scheduler.schedule(snapshot(1), 1000);
        assert!(scheduler.flush_now().is_some());
        assert!(scheduler.flush_now().is_none());
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn cancel_drops_pending() {
        let mut scheduler = SyncScheduler::default();
        assert!(!scheduler.cancel());
        scheduler.schedule(snapshot(1), 0);
        assert!(scheduler.cancel());
        assert!(scheduler.poll(u64::MAX).is_none());
    }

    #[test]
    fn anonymous_save_skips_remote() {
        assert_eq!(plan_remote_write(&snapshot(2), None, 0), RemoteWrite::Skip);
    }

    #[test]
    fn empty_answers_delete_remote_row() {
        assert_eq!(
            plan_remote_write(&snapshot(0), Some("u1"), 0),
            RemoteWrite::DeleteProgress
        );
    }

    #[test]
    fn graded_snapshot_skips_progress() {
        let mut graded = snapshot(5);
        graded.status = SessionStatus::Approved;
        graded.completed_at = Some(1);
        assert_eq!(
            plan_remote_write(&graded, Some("u1"), 0),
            RemoteWrite::Skip
        );
    }

    #[test]
    fn answered_snapshot_upserts_sparse_row() {
        let mut answered = snapshot(2);
        answered.current_question = 3;
        answered.updated_at = Some(777);

        let RemoteWrite::UpsertProgress(row) = plan_remote_write(&answered, Some("u1"), 0) else {
            panic!("expected upsert");
        };
        assert_eq!(row.user_id, "u1");
        assert_eq!(row.current_question, 3);
        assert_eq!(row.answers.len(), 2);
        assert_eq!(row.updated_at, 777);
    }
}
