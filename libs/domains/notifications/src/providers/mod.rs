//! Email transport providers.

mod smtp;

pub use smtp::{SmtpConfig, SmtpProvider};

use crate::error::NotificationResult;
use async_trait::async_trait;

/// A fully rendered email ready for sending.
#[derive(Debug, Clone, Default)]
pub struct EmailMessage {
    /// Recipient email address.
    pub to_email: String,
    /// Recipient display name.
    pub to_name: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
    /// Plain text body.
    pub text_body: String,
}

/// Result of a provider send.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Provider-specific message id for tracking, when available.
    pub message_id: Option<String>,
    /// Whether the message was accepted for delivery.
    pub accepted: bool,
}

/// Trait for email sending transports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &EmailMessage) -> NotificationResult<SentEmail>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Check that the transport is reachable/configured.
    async fn health_check(&self) -> NotificationResult<bool>;
}
