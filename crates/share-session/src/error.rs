//! Session error types

use secret_protocol::ShareState;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The share reached a terminal state; nothing will be released
    #[error("Share is gone ({0})")]
    Gone(ShareState),

    #[error("Share not found")]
    NotFound,

    #[error("Invalid view budget: must allow at least one view")]
    InvalidMaxViews,
}

pub type SessionResult<T> = Result<T, SessionError>;
