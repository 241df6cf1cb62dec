//! Error types for database operations

use thiserror::Error;

/// Database error types
#[derive(Error, Debug)]
pub enum Error {
    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data that does not decode
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<Error> for codeops_core::Error {
    fn from(e: Error) -> Self {
        codeops_core::Error::PersistenceFailed(e.to_string())
    }
}

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, Error>;
