//! Email delivery channel.
//!
//! Resolves the recipient's address through the directory collaborator,
//! renders the per-kind email body, and sends via the configured
//! provider. A recipient without an address on file is an expected no-op.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::DeliveryChannel;
use crate::directory::RecipientDirectory;
use crate::error::NotificationResult;
use crate::mailer::EmailTemplates;
use crate::models::NotificationPayload;
use crate::providers::{EmailMessage, EmailProvider};

/// Email adapter over a provider transport.
pub struct EmailChannel<P: EmailProvider> {
    directory: Arc<dyn RecipientDirectory>,
    provider: Arc<P>,
    templates: Arc<EmailTemplates>,
}

impl<P: EmailProvider> EmailChannel<P> {
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        provider: Arc<P>,
        templates: Arc<EmailTemplates>,
    ) -> Self {
        Self {
            directory,
            provider,
            templates,
        }
    }
}

#[async_trait]
impl<P: EmailProvider + 'static> DeliveryChannel for EmailChannel<P> {
    async fn send(&self, payload: &NotificationPayload) -> NotificationResult<()> {
        let Some(address) = self
            .directory
            .email_for_user(payload.recipient_id)
            .await?
        else {
            debug!(
                recipient_id = payload.recipient_id,
                kind = %payload.kind,
                "Recipient has no email address on file, skipping email delivery"
            );
            return Ok(());
        };

        let rendered = self.templates.render_notification(payload)?;

        let sent = self
            .provider
            .send(&EmailMessage {
                to_email: address,
                to_name: String::new(),
                subject: rendered.subject,
                html_body: rendered.html,
                text_body: rendered.text,
            })
            .await?;

        debug!(
            recipient_id = payload.recipient_id,
            kind = %payload.kind,
            message_id = ?sent.message_id,
            "Sent notification email"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
