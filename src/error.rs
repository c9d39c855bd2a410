//! Session error taxonomy.
//!
//! Every rejected inbound message maps to one of these variants; the handler
//! turns it into an `error` reply on the originating connection only. None of
//! them are fatal to the session.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// Malformed or out-of-range input (empty nickname, bad action shape).
    #[error("{0}")]
    Validation(String),

    /// Caller lacks the role required for the action.
    #[error("{0}")]
    Unauthorized(String),

    /// Action issued outside the phase that permits it.
    #[error("{0}")]
    Phase(String),

    /// Referenced participant is not connected.
    #[error("{0}")]
    NotFound(String),
}

impl SessionError {
    /// Stable code string for the `error` wire message.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "INVALID_INPUT",
            SessionError::Unauthorized(_) => "UNAUTHORIZED",
            SessionError::Phase(_) => "BAD_PHASE",
            SessionError::NotFound(_) => "NOT_FOUND",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        SessionError::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        SessionError::Unauthorized(msg.into())
    }

    pub fn phase(msg: impl Into<String>) -> Self {
        SessionError::Phase(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        SessionError::NotFound(msg.into())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
