//! Edge case tests for autotest-engine
//!
//! These tests walk whole attempts through the public API: session, store,
//! scheduler and reconciler together.

use autotest_engine::{
    plan_remote_write, reconcile, Clock, ManualClock, MemoryBackend, Origin, Question,
    ReconciledStatus, RemoteTestProgress, RemoteTestResult, RemoteWrite, SessionStatus,
    SessionStore, StatusMap, StatusSource, SyncScheduler, TestConfig, TestDefinition, TestMode,
    TestSession, TestSessionSnapshot, Tick,
};
use std::sync::{Arc, Mutex};

const T0: u64 = 1_706_745_600_000;

fn create_test_definition(questions: usize) -> TestDefinition {
    TestDefinition {
        id: "test1".into(),
        title: "Test 001".into(),
        category: "B".into(),
        questions: (0..questions)
            .map(|i| Question {
                question: format!("Question {}", i + 1),
                options: vec!["A".into(), "B".into(), "C".into()],
                answer: "A".into(),
                image: None,
            })
            .collect(),
    }
}

fn active_session(questions: usize) -> TestSession {
    let mut session = TestSession::loading("test1", TestConfig::default());
    session
        .initialize(create_test_definition(questions), None, None)
        .unwrap();
    session
}

fn create_store() -> (SessionStore, Arc<MemoryBackend>, Arc<ManualClock>) {
    let backend = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::new(T0));
    let store = SessionStore::new(backend.clone(), clock.clone());
    (store, backend, clock)
}

fn status(
    status: SessionStatus,
    completed_at: Option<u64>,
    updated_at: Option<u64>,
) -> ReconciledStatus {
    ReconciledStatus {
        test_id: "test1".into(),
        status,
        score: None,
        total_questions: None,
        current_question: None,
        completed_at,
        updated_at,
        source: StatusSource::Local,
    }
}

// ============================================================================
// Grading
// ============================================================================

#[test]
fn restart_then_finish_with_no_answers() {
    let mut session = active_session(30);
    session.select_answer("A").unwrap();
    session.restart().unwrap();

    let outcome = session.finish(T0).unwrap();
    assert_eq!(outcome.grade.unanswered, 30);
    assert_eq!(outcome.grade.correct, 0);
    assert!(!outcome.passed);
}

#[test]
fn twenty_seven_correct_passes() {
    let mut session = active_session(30);
    for i in 0..30 {
        session.jump_to(i);
        match i {
            0..=26 => {
                session.select_answer("A").unwrap();
            }
            27 | 28 => {
                session.select_answer("B").unwrap();
            }
            _ => {}
        }
    }

    let outcome = session.finish(T0).unwrap();
    assert_eq!(outcome.grade.correct, 27);
    assert_eq!(outcome.grade.incorrect, 2);
    assert_eq!(outcome.grade.unanswered, 1);
    assert!(outcome.passed);
}

#[test]
fn passing_threshold_is_configurable() {
    let mut session = TestSession::loading("test1", TestConfig::new(2, 60));
    session
        .initialize(create_test_definition(3), None, None)
        .unwrap();
    session.select_answer("A").unwrap();
    session.next();
    session.select_answer("A").unwrap();

    assert!(session.finish(T0).unwrap().passed);
}

// ============================================================================
// Countdown
// ============================================================================

#[test]
fn countdown_counts_remaining_as_unanswered() {
    let mut session = TestSession::loading("test1", TestConfig::new(27, 5));
    session
        .initialize(create_test_definition(30), None, None)
        .unwrap();
    for i in 0..25 {
        session.jump_to(i);
        session.select_answer("B").unwrap();
    }

    let mut now = T0;
    let outcome = loop {
        now += 1000;
        match session.tick(now) {
            Tick::Running(_) => continue,
            Tick::Expired(outcome) => break outcome,
            Tick::Idle => panic!("session stopped counting"),
        }
    };

    assert_eq!(outcome.grade.unanswered, 5);
    assert_eq!(outcome.grade.incorrect, 25);
    assert_eq!(outcome.completed_at, T0 + 5000);
    assert!(session.is_finished());
}

#[test]
fn zero_time_local_snapshot_finishes_on_first_tick() {
    let mut local = TestSessionSnapshot::new("test1", "B", 3);
    local.time_remaining_secs = Some(0);

    let mut session = TestSession::loading("test1", TestConfig::default());
    session
        .initialize(create_test_definition(3), None, Some(&local))
        .unwrap();
    assert!(matches!(session.tick(T0), Tick::Expired(_)));
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn jump_to_last_keeps_answers() {
    let mut session = active_session(30);
    session.select_answer("C").unwrap();
    let before = session.answers().to_vec();

    assert!(session.jump_to(29));
    assert_eq!(session.current_index(), 29);
    assert_eq!(session.answers(), before.as_slice());
}

// ============================================================================
// Store
// ============================================================================

#[test]
fn store_round_trip_preserves_snapshot() {
    let (store, _, clock) = create_store();
    let mut session = active_session(30);
    session.select_answer("B").unwrap();
    session.jump_to(12);

    let snapshot = session.snapshot().unwrap();
    clock.advance(250);
    store.set("test1", Some(snapshot.clone()));

    let mut read = store.get("test1").unwrap();
    assert_eq!(read.updated_at, Some(T0 + 250));
    read.updated_at = snapshot.updated_at;
    assert_eq!(read, snapshot);
}

#[test]
fn cross_tab_delete_is_seen_by_other_tab() {
    let backend = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::new(T0));
    let tab_a = SessionStore::new(backend.clone(), clock.clone());
    let tab_b = SessionStore::new(backend, clock);

    tab_a.set("X", Some(TestSessionSnapshot::new("X", "B", 30)));
    tab_b.sync_from_backend();
    assert!(tab_b.get("X").is_some());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = tab_b.subscribe(move |event| {
        sink.lock()
            .unwrap()
            .push((event.test_id.clone(), event.snapshot.is_none(), event.origin));
    });

    tab_a.set("X", None);
    tab_b.sync_from_backend();

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[("X".to_string(), true, Origin::External)]
    );
    assert!(tab_b.get("X").is_none());
}

#[test]
fn finished_attempt_reopens_as_finished() {
    let (store, _, _) = create_store();
    let mut session = active_session(3);
    session.select_answer("A").unwrap();
    session.finish(T0 + 10).unwrap();
    store.set("test1", session.snapshot());

    let mut reopened = TestSession::loading("test1", TestConfig::default());
    reopened
        .initialize(create_test_definition(3), None, store.get("test1").as_ref())
        .unwrap();

    assert!(reopened.is_finished());
    assert_eq!(reopened.outcome(), session.outcome());
}

// ============================================================================
// Scheduler
// ============================================================================

#[test]
fn debounced_autosave_writes_last_state_once() {
    let (store, _, clock) = create_store();
    let writes = Arc::new(Mutex::new(0));
    let counter = writes.clone();
    let _sub = store.subscribe(move |_| *counter.lock().unwrap() += 1);

    let mut session = active_session(5);
    let mut scheduler = SyncScheduler::new(300);

    for option in ["A", "B", "C"] {
        session.select_answer(option).unwrap();
        scheduler.schedule(session.snapshot().unwrap(), clock.now());
        clock.advance(100);
        if let Some(due) = scheduler.poll(clock.now()) {
            store.set("test1", Some(due));
        }
    }

    clock.advance(300);
    if let Some(due) = scheduler.poll(clock.now()) {
        store.set("test1", Some(due));
    }

    assert_eq!(*writes.lock().unwrap(), 1);
    assert_eq!(store.get("test1").unwrap().answers[0].as_deref(), Some("C"));
}

#[test]
fn unanswered_save_removes_remote_row() {
    let session = active_session(5);
    let snapshot = session.snapshot().unwrap();
    assert_eq!(
        plan_remote_write(&snapshot, Some("u1"), T0),
        RemoteWrite::DeleteProgress
    );
}

// ============================================================================
// Reconciliation
// ============================================================================

#[test]
fn equal_instant_tie_goes_to_graded() {
    let mut map = StatusMap::new();
    map.upsert(status(SessionStatus::Incomplete, None, Some(T0)));
    map.upsert(status(SessionStatus::Approved, Some(T0), None));
    assert_eq!(map.get("test1").unwrap().status, SessionStatus::Approved);
}

#[test]
fn older_incomplete_does_not_displace_approved() {
    let mut map = StatusMap::new();
    map.upsert(status(SessionStatus::Approved, Some(T0), None));
    map.upsert(status(SessionStatus::Incomplete, None, Some(T0 - 1)));
    assert_eq!(map.get("test1").unwrap().status, SessionStatus::Approved);
}

#[test]
fn category_listing_merges_all_sources() {
    let results = vec![RemoteTestResult {
        user_id: "u1".into(),
        test_id: "test1".into(),
        category: "B".into(),
        score: 28,
        total_questions: 30,
        passed: true,
        completed_at: T0,
        test_mode: TestMode::Exam,
    }];
    let progress = vec![
        RemoteTestProgress::from_answers("u1", "test1", "B", 3, &[Some("A".into())], T0 - 100),
        RemoteTestProgress::from_answers("u1", "test2", "B", 7, &[Some("A".into())], T0),
    ];

    let mut failed_locally = TestSessionSnapshot::new("test3", "B", 30);
    failed_locally.status = SessionStatus::Failed;
    failed_locally.score = Some(10);
    failed_locally.completed_at = Some(T0 + 5);
    let mut stale_local = TestSessionSnapshot::new("test2", "B", 30);
    stale_local.updated_at = Some(T0 - 1);
    stale_local.current_question = 1;

    let map = reconcile(&results, &progress, &[failed_locally, stale_local]);

    assert_eq!(map.get("test1").unwrap().status, SessionStatus::Approved);
    assert_eq!(map.get("test2").unwrap().current_question, Some(7));
    assert_eq!(map.get("test2").unwrap().source, StatusSource::RemoteProgress);
    assert_eq!(map.get("test3").unwrap().status, SessionStatus::Failed);

    let summary = map.summary();
    assert_eq!((summary.approved, summary.failed, summary.incomplete), (1, 1, 1));
}
