//! Error types for study-core.

use thiserror::Error;

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the engine's pure operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed input: bad dates, non-positive offsets, unresolvable subject.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested transition collides with the item's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The referenced item does not exist or belongs to another user.
    #[error("not found: {0}")]
    NotFound(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
