//! Session errors

use thiserror::Error;

use super::SessionState;

/// Errors from session lookup and state transitions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {0} is busy with another request")]
    Busy(String),

    #[error("Session {id} is {actual}, expected {expected}")]
    InvalidState {
        id: String,
        expected: SessionState,
        actual: SessionState,
    },
}
