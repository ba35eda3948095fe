//! Error handling for the backend services

use study_core::EngineError;
use thiserror::Error;

/// Service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP-equivalent status code for callers that expose these errors.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Database(_)
            | ServiceError::Migration(_)
            | ServiceError::Config(_)
            | ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "database_error",
            ServiceError::Migration(_) => "migration_error",
            ServiceError::Config(_) => "config_error",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ServiceError::Validation(msg),
            EngineError::Conflict(msg) => ServiceError::Conflict(msg),
            EngineError::NotFound(msg) => ServiceError::NotFound(msg),
        }
    }
}

/// Whether a database error is a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
