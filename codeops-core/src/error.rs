//! Error types for the CodeOps agent

use thiserror::Error;

use crate::completion::CompletionError;
use crate::pipeline::StageName;

/// Result type alias for CodeOps operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for CodeOps operations
#[derive(Error, Debug)]
pub enum Error {
    /// The completion service failed on every allowed attempt
    #[error("Completion service unavailable after {attempts} attempt(s): {source}")]
    CompletionUnavailable {
        /// Number of attempts actually made
        attempts: u32,
        /// The last underlying failure
        #[source]
        source: CompletionError,
    },

    /// A reasoning stage could not produce its output
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        /// The stage that failed
        stage: StageName,
        /// What went wrong inside the stage
        #[source]
        source: Box<Error>,
    },

    /// The context store could not be reached; the pipeline continues without context
    #[error("Context retrieval degraded: {0}")]
    ContextRetrievalDegraded(String),

    /// A side-channel notification could not be delivered
    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    /// A repository hosting operation failed
    #[error("Repository operation failed: {0}")]
    RepositoryOperationFailed(String),

    /// The run store could not save or load records
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Caller supplied an unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap this error as the failure of a pipeline stage
    pub fn in_stage(self, stage: StageName) -> Self {
        Error::StageFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// Whether this error came from an exhausted completion service
    pub fn is_completion_unavailable(&self) -> bool {
        match self {
            Error::CompletionUnavailable { .. } => true,
            Error::StageFailed { source, .. } => source.is_completion_unavailable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_display() {
        let err = Error::CompletionUnavailable {
            attempts: 3,
            source: CompletionError::Timeout,
        }
        .in_stage(StageName::Planning);

        let msg = err.to_string();
        assert!(msg.contains("planning"));
        assert!(msg.contains("3 attempt(s)"));
        assert!(err.is_completion_unavailable());
    }

    #[test]
    fn test_other_errors_are_not_completion_failures() {
        assert!(!Error::NotificationFailed("webhook down".to_string()).is_completion_unavailable());
    }
}
