//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Branch or tag that does not exist
    #[error("Reference not found: {0}")]
    RefNotFound(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<Error> for codeops_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Auth(msg) => codeops_core::Error::Config(msg),
            Error::Parse(msg) => codeops_core::Error::Config(msg),
            other => codeops_core::Error::RepositoryOperationFailed(other.to_string()),
        }
    }
}
