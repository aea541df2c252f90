//! Error types for the AutoTest engine.

use crate::TestId;
use thiserror::Error;

/// All possible errors from the AutoTest engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Test definition errors
    #[error("test has no questions: {0}")]
    EmptyTest(TestId),

    #[error("invalid test definition: {0}")]
    InvalidTest(String),

    // Session errors
    #[error("question index out of range: {index} (question count {count})")]
    QuestionOutOfRange { index: usize, count: usize },

    #[error("option '{option}' is not offered by question {index}")]
    UnknownOption { index: usize, option: String },

    #[error("session is not active")]
    SessionNotActive,

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
