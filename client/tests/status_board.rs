//! Integration tests for category status listings.

mod common;

use autotest_client::StatusBoard;
use autotest_engine::{
    RemoteTestProgress, RemoteTestResult, SessionStatus, SessionStore, StatusSource, TestMode,
    TestSessionSnapshot,
};
use common::*;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn result(test_id: &str, category: &str, score: u32, completed_at: u64) -> RemoteTestResult {
    RemoteTestResult {
        user_id: "u1".into(),
        test_id: test_id.into(),
        category: category.into(),
        score,
        total_questions: 30,
        passed: score >= 27,
        completed_at,
        test_mode: TestMode::Exam,
    }
}

fn empty_harness(remote: std::sync::Arc<FakeRemote>) -> Harness {
    harness(remote, FakeBank::with(vec![]))
}

#[tokio::test]
async fn refresh_merges_remote_and_local() {
    let remote = FakeRemote::signed_in("u1");
    remote
        .results
        .lock()
        .unwrap()
        .extend([result("test1", "B", 28, T0 + 1000), result("test9", "C", 10, T0)]);
    remote.progress.lock().unwrap().insert(
        "test2".into(),
        RemoteTestProgress::from_answers("u1", "test2", "B", 4, &[Some("A".into())], T0 + 500),
    );

    let h = empty_harness(remote);
    h.ctx.store.set("test1", Some(TestSessionSnapshot::new("test1", "B", 30)));
    h.ctx.store.set("test3", Some(TestSessionSnapshot::new("test3", "B", 30)));

    let board = StatusBoard::new(h.ctx.clone(), "B");
    assert!(board.refresh().await);

    let statuses = board.statuses();
    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses.get("test1").unwrap().status, SessionStatus::Approved);
    assert_eq!(statuses.get("test1").unwrap().source, StatusSource::RemoteResult);
    assert_eq!(statuses.get("test2").unwrap().current_question, Some(4));
    assert_eq!(statuses.get("test3").unwrap().source, StatusSource::Local);
    assert!(statuses.get("test9").is_none());

    let summary = board.summary();
    assert_eq!(summary.approved, 1);
    assert_eq!(summary.incomplete, 2);

    let history = board.history();
    assert_eq!(history.tests_completed, 1);
    assert_eq!(history.best_score, Some(28));
    assert_eq!(board.committed_token(), 1);
}

#[tokio::test]
async fn newer_local_attempt_beats_older_result() {
    let remote = FakeRemote::signed_in("u1");
    remote
        .results
        .lock()
        .unwrap()
        .push(result("test1", "B", 12, T0 - 60_000));

    let h = empty_harness(remote);
    h.ctx.store.set("test1", Some(TestSessionSnapshot::new("test1", "B", 30)));

    let board = StatusBoard::new(h.ctx.clone(), "B");
    board.refresh().await;

    let status = board.statuses().get("test1").cloned().unwrap();
    assert_eq!(status.status, SessionStatus::Incomplete);
    assert_eq!(status.updated_at, Some(T0));
}

#[tokio::test]
async fn anonymous_listing_uses_local_only() {
    let remote = FakeRemote::anonymous();
    remote
        .results
        .lock()
        .unwrap()
        .push(result("test1", "B", 30, T0));

    let h = empty_harness(remote);
    h.ctx.store.set("test2", Some(TestSessionSnapshot::new("test2", "B", 30)));

    let board = StatusBoard::new(h.ctx.clone(), "B");
    board.refresh().await;

    let statuses = board.statuses();
    assert_eq!(statuses.len(), 1);
    assert!(statuses.get("test2").is_some());
    assert_eq!(board.history().tests_completed, 0);
}

#[tokio::test]
async fn remote_failure_falls_back_to_local() {
    let remote = FakeRemote::signed_in("u1");
    remote.fail_reads.store(true, Ordering::SeqCst);

    let h = empty_harness(remote);
    h.ctx.store.set("test1", Some(TestSessionSnapshot::new("test1", "B", 30)));

    let board = StatusBoard::new(h.ctx.clone(), "B");
    assert!(board.refresh().await);
    assert_eq!(board.statuses().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn superseded_refresh_is_discarded() {
    let remote = FakeRemote::signed_in("u1");
    remote
        .results
        .lock()
        .unwrap()
        .push(result("test1", "B", 28, T0));
    remote
        .list_delays
        .lock()
        .unwrap()
        .extend([Duration::from_millis(200), Duration::from_millis(10)]);

    let h = empty_harness(remote);
    let board = StatusBoard::new(h.ctx.clone(), "B");

    let (slow, fast) = tokio::join!(board.refresh(), board.refresh());
    assert!(!slow);
    assert!(fast);
    assert_eq!(board.committed_token(), 2);
    assert_eq!(board.statuses().len(), 1);
}

#[tokio::test]
async fn unmounted_board_commits_nothing() {
    let h = empty_harness(FakeRemote::signed_in("u1"));
    h.ctx.store.set("test1", Some(TestSessionSnapshot::new("test1", "B", 30)));

    let board = StatusBoard::new(h.ctx.clone(), "B");
    board.unmount();

    assert!(!board.refresh().await);
    assert_eq!(board.committed_token(), 0);
    assert!(board.statuses().is_empty());
}

#[tokio::test(start_paused = true)]
async fn store_changes_in_category_trigger_refresh() {
    let h = empty_harness(FakeRemote::anonymous());
    let board = StatusBoard::new(h.ctx.clone(), "B");
    let _subscription = board.watch_store();

    h.ctx.store.set("test1", Some(TestSessionSnapshot::new("test1", "B", 30)));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(board.committed_token(), 1);
    assert!(board.statuses().get("test1").is_some());

    h.ctx.store.set("other", Some(TestSessionSnapshot::new("other", "C", 30)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(board.committed_token(), 1);

    h.ctx.store.clear("test1");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(board.committed_token(), 2);
    assert!(board.statuses().is_empty());
}

#[tokio::test(start_paused = true)]
async fn other_tab_write_refreshes_after_local_save() {
    let h = empty_harness(FakeRemote::anonymous());
    let other_tab = SessionStore::new(h.backend.clone(), h.clock.clone());
    let board = StatusBoard::new(h.ctx.clone(), "B");
    let _subscription = board.watch_store();

    // The other tab writes in this category, then this tab saves elsewhere
    // before any sync has run.
    other_tab.set("test5", Some(TestSessionSnapshot::new("test5", "B", 30)));
    h.ctx.store.set("other", Some(TestSessionSnapshot::new("other", "C", 30)));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(board.committed_token(), 1);
    assert!(board.statuses().get("test5").is_some());
}

#[tokio::test(start_paused = true)]
async fn dropped_subscription_stops_refreshing() {
    let h = empty_harness(FakeRemote::anonymous());
    let board = StatusBoard::new(h.ctx.clone(), "B");
    let subscription = board.watch_store();
    drop(subscription);

    h.ctx.store.set("test1", Some(TestSessionSnapshot::new("test1", "B", 30)));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(board.committed_token(), 0);
    assert_eq!(h.ctx.store.listener_count(), 0);
}
