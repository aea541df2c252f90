//! # AutoTest Engine
//!
//! Deterministic core of the AutoTest practice-test client.
//!
//! This crate owns everything about a test attempt that has invariants: the
//! attempt's state machine, the local snapshot store, the rules that merge
//! remote and local status, and the decision of when and where to save.
//!
//! ## Design Principles
//!
//! - **No IO**: storage is a synchronous [`StorageBackend`] trait, time is an
//!   injected [`Clock`], and remote collaborators live in the client crate
//! - **Deterministic**: the same candidates always reconcile to the same status
//! - **Never throws for expected failures**: storage errors are logged and
//!   read as absence
//!
//! ## Core Concepts
//!
//! ### Snapshots
//!
//! A [`TestSessionSnapshot`] captures one attempt: answers, position, status,
//! score and timestamps. The [`SessionStore`] keeps one per test id and
//! notifies subscribers of every change, including changes made by other
//! processes sharing the same storage.
//!
//! ### Sessions
//!
//! A [`TestSession`] drives one attempt through `Loading -> Active ->
//! Finished`: navigation, answer capture, the countdown and grading.
//!
//! ### Reconciliation
//!
//! [`reconcile`] folds remote results, remote progress rows and local
//! snapshots into one [`ReconciledStatus`] per test, newest first and graded
//! over incomplete on ties.
//!
//! ### Scheduling
//!
//! [`SyncScheduler`] debounces autosaves; [`plan_remote_write`] decides what a
//! save means for the remote progress row.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use autotest_engine::{
//!     ManualClock, MemoryBackend, Question, SessionStore, TestConfig, TestDefinition,
//!     TestSession,
//! };
//!
//! let definition = TestDefinition {
//!     id: "test1".into(),
//!     title: "Test 001".into(),
//!     category: "B".into(),
//!     questions: vec![Question {
//!         question: "Maximum speed in town?".into(),
//!         options: vec!["30".into(), "50".into()],
//!         answer: "50".into(),
//!         image: None,
//!     }],
//! };
//!
//! let clock = Arc::new(ManualClock::new(1_706_745_600_000));
//! let store = SessionStore::new(Arc::new(MemoryBackend::new()), clock);
//!
//! let mut session = TestSession::loading("test1", TestConfig::new(1, 60));
//! session.initialize(definition, None, store.get("test1").as_ref()).unwrap();
//! session.select_answer("50").unwrap();
//!
//! let outcome = session.finish(1_706_745_660_000).unwrap();
//! assert!(outcome.passed);
//!
//! store.set("test1", session.snapshot());
//! assert!(store.get("test1").unwrap().is_terminal());
//! ```

pub mod clock;
pub mod definition;
pub mod error;
pub mod history;
pub mod reconcile;
pub mod record;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use definition::{
    grade, Grade, Question, TestConfig, TestDefinition, DEFAULT_PASSING_THRESHOLD,
    DEFAULT_TIME_LIMIT_SECS,
};
pub use error::Error;
pub use history::HistorySummary;
pub use reconcile::{
    reconcile, should_replace, Conflict, ReconciledStatus, Reconciler, StatusMap, StatusSource,
    StatusSummary,
};
pub use record::{Origin, RemoteTestProgress, RemoteTestResult, TestMode};
pub use scheduler::{
    plan_remote_write, FlushReason, RemoteWrite, SyncScheduler, DEFAULT_QUIET_PERIOD_MS,
};
pub use session::{format_time, SeedSource, SessionPhase, TestOutcome, TestSession, Tick};
pub use snapshot::{LocalDocument, SessionStatus, TestSessionSnapshot, DOCUMENT_FORMAT_VERSION};
pub use store::{
    ChangeEvent, MemoryBackend, SessionStore, StorageBackend, Subscription, UnavailableBackend,
    STORAGE_KEY,
};

/// Type aliases for clarity
pub type TestId = String;
pub type Category = String;
pub type UserId = String;
pub type Timestamp = u64;
