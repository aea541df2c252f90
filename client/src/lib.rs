//! # AutoTest Client
//!
//! Async orchestration around [`autotest_engine`]: runs test attempts and
//! category listings against the real collaborators.
//!
//! - [`RemoteSync`] and [`QuestionBank`] are the collaborator seams, with
//!   null-object and HTTP implementations.
//! - [`FileBackend`] persists the local store; [`StorageWatcher`] turns
//!   writes made by other processes into change events.
//! - [`AppContext`] is built once from [`ClientConfig`] and passed down.
//! - [`SessionDriver`] and [`run_session`] drive one attempt: countdown,
//!   debounced autosave, lifecycle flushes and finalize.
//! - [`StatusBoard`] keeps the reconciled status of one category fresh.

pub mod backend;
pub mod bank;
pub mod clock;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod remote;
pub mod status;

pub use backend::{FileBackend, StorageWatcher};
pub use bank::{DirQuestionBank, HttpQuestionBank, QuestionBank};
pub use clock::TokioClock;
pub use config::{ClientConfig, ConfigError};
pub use context::AppContext;
pub use driver::{run_session, Lifecycle, SessionCommand, SessionDriver};
pub use error::{ClientError, Result};
pub use remote::{HttpRemote, NullRemote, RemoteSync, User};
pub use status::StatusBoard;
