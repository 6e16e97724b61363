use thiserror::Error;

use crate::storage::StorageError;

/// Misuse of a test session. These point at a bug in the caller, not at the student.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a session needs at least one question")]
    Empty,

    #[error("question index {index} is out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("question {0} has already been answered")]
    AlreadyAnswered(usize),

    #[error("only {selected} of {total} items have been ranked")]
    OrderingIncomplete { selected: usize, total: usize },

    #[error("question {0} is not an ordering question")]
    NotOrdering(usize),
}

/// Rejections raised while committing a draft. Draft indices are 0-based.
#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("test name is required")]
    EmptyTestName,

    #[error("teacher name is required")]
    EmptyTeacherName,

    #[error("a test needs at least one question")]
    NoQuestions,

    #[error("question {0} has an empty body")]
    EmptyQuestionBody(usize),

    #[error("question {0} has no correct option")]
    NoCorrectOption(usize),

    #[error("ordering question {0} needs at least two items")]
    TooFewOrderingItems(usize),

    #[error("ordering question {0} positions are not a permutation of 1..N")]
    MalformedPositions(usize),

    #[error("no draft question at index {0}")]
    UnknownDraftIndex(usize),

    #[error("a test named '{0}' already exists")]
    DuplicateName(String),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for AuthoringError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateName(name) => AuthoringError::DuplicateName(name),
            other => AuthoringError::Storage(other),
        }
    }
}
