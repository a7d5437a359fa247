//! Error types for the notifications domain.

use queue_worker::QueueError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Notification id does not exist.
    #[error("Notification {0} not found")]
    NotFound(Uuid),

    /// Database error from the notification store.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A channel adapter failed to deliver.
    #[error("Delivery error on channel '{channel}': {message}")]
    Delivery {
        channel: &'static str,
        message: String,
    },

    /// Email provider error.
    #[error("Email provider error: {0}")]
    Provider(String),

    /// Template rendering error.
    #[error("Template rendering error: {0}")]
    Template(String),

    /// A collaborator directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotificationError {
    pub fn delivery(channel: &'static str, message: impl Into<String>) -> Self {
        NotificationError::Delivery {
            channel,
            message: message.into(),
        }
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

/// Map domain errors onto queue error categories: infrastructure failures
/// are retried, everything deterministic fails fast.
impl From<NotificationError> for QueueError {
    fn from(err: NotificationError) -> Self {
        match &err {
            NotificationError::Database(_)
            | NotificationError::Provider(_)
            | NotificationError::Directory(_)
            | NotificationError::Delivery { .. } => QueueError::transient(err.to_string()),
            NotificationError::NotFound(_)
            | NotificationError::Template(_)
            | NotificationError::Serialization(_)
            | NotificationError::Internal(_) => QueueError::permanent(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queue_worker::ErrorCategory;

    #[test]
    fn test_database_errors_map_to_transient() {
        let err: QueueError =
            NotificationError::Provider("smtp unreachable".to_string()).into();
        assert_eq!(err.category(), ErrorCategory::Transient);
    }

    #[test]
    fn test_template_errors_map_to_permanent() {
        let err: QueueError = NotificationError::Template("bad template".to_string()).into();
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }
}
