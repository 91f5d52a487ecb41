//! Shared error types for the services crate.
//!
//! Expected conditions — insufficient allowance, zero results — are distinct
//! variants so callers can branch on them; panics are reserved for bugs.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by the question source adapter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the notebook merge step.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MergeError {
    #[error("notebook resolved to no questions")]
    Empty,
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Errors that keep the engine in the selection state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StartError {
    /// The allowance gate reported the distinct `insufficient` kind; the
    /// host UI presents a refill path for this one.
    #[error("allowance exhausted for this program")]
    InsufficientAllowance,

    #[error("no questions available for the requested criteria")]
    NoQuestions,

    #[error("a practice session is already in progress")]
    AlreadyPracticing,

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl From<MergeError> for StartError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Empty => StartError::NoQuestions,
            MergeError::Source(e) => StartError::Source(e),
        }
    }
}

/// Errors emitted by operations on a live session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,

    #[error("no practice session is active")]
    NotPracticing,

    #[error("session already completed")]
    Completed,
}

/// Errors emitted by the gamification coefficients client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoefficientsError {
    #[error("gamification coefficients endpoint is not configured")]
    Disabled,
    #[error("coefficients request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the subscriber-status client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AccessError {
    #[error("subscriber status endpoint is not configured")]
    Disabled,
    #[error("subscriber status request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
