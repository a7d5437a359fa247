//! Queue error types and categorization
//!
//! Errors are categorized to determine retry behavior:
//! - **Transient**: temporary failures, retried per the job's backoff policy
//! - **Permanent**: deterministic failures, fail the job immediately without
//!   burning the retry budget (e.g. an unregistered job kind)

use thiserror::Error;
use uuid::Uuid;

/// Category of error for determining retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failure - retry with backoff up to the attempt limit
    Transient,
    /// Deterministic failure - retrying would reproduce it, fail immediately
    Permanent,
}

impl ErrorCategory {
    /// Whether jobs failing with this category should be retried
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorCategory::Transient)
    }
}

/// Errors surfaced by the queue engine
#[derive(Error, Debug)]
pub enum QueueError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Job payload could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Enqueue attempted against a queue outside the fixed set
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// The job's kind discriminator has no registered handler
    #[error("No handler registered for job kind '{0}'")]
    UnknownJobKind(String),

    /// Read or update against a job id that does not exist
    #[error("Job {id} not found in queue '{queue}'")]
    JobNotFound { queue: String, id: Uuid },

    /// A handler failed while processing a job
    #[error("Handler error: {message}")]
    Handler {
        message: String,
        category: ErrorCategory,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueueError {
    /// Create a transient handler error
    pub fn transient(message: impl Into<String>) -> Self {
        QueueError::Handler {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    /// Create a permanent handler error
    pub fn permanent(message: impl Into<String>) -> Self {
        QueueError::Handler {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            QueueError::Redis(_) => ErrorCategory::Transient,
            QueueError::Serialization(_) => ErrorCategory::Permanent,
            QueueError::UnknownQueue(_) => ErrorCategory::Permanent,
            QueueError::UnknownJobKind(_) => ErrorCategory::Permanent,
            QueueError::JobNotFound { .. } => ErrorCategory::Permanent,
            QueueError::Handler { category, .. } => *category,
            QueueError::Config(_) => ErrorCategory::Permanent,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_categories() {
        assert_eq!(
            QueueError::transient("redis hiccup").category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            QueueError::permanent("bad payload").category(),
            ErrorCategory::Permanent
        );
    }

    #[test]
    fn test_unknown_kind_is_permanent() {
        let err = QueueError::UnknownJobKind("no:such:kind".to_string());
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(!err.category().should_retry());
    }

    #[test]
    fn test_transient_should_retry() {
        assert!(ErrorCategory::Transient.should_retry());
        assert!(!ErrorCategory::Permanent.should_retry());
    }
}
