//! SMTP email provider using lettre.
//!
//! Covers both production SMTP relays (TLS + credentials) and local
//! development servers like Mailpit (plain transport, no auth).

use super::{EmailMessage, EmailProvider, SentEmail};
use crate::error::{NotificationError, NotificationResult};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, error, info};

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Sender email address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: String,
    /// SMTP username (optional for dev servers).
    pub username: Option<String>,
    /// SMTP password (optional for dev servers).
    pub password: Option<String>,
    /// Whether to use TLS (false for local dev servers).
    pub use_tls: bool,
}

impl SmtpConfig {
    pub fn new(host: String, port: u16, from_email: String, from_name: String) -> Self {
        Self {
            host,
            port,
            from_email,
            from_name,
            username: None,
            password: None,
            use_tls: false,
        }
    }

    /// Configuration from `SMTP_*` environment variables, defaulting to a
    /// local Mailpit on port 1025.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "1025".to_string())
                .parse()
                .unwrap_or(1025),
            from_email: std::env::var("SMTP_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@localhost".to_string()),
            from_name: std::env::var("SMTP_FROM_NAME")
                .unwrap_or_else(|_| "Employee Portal".to_string()),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            use_tls: std::env::var("SMTP_USE_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

/// SMTP email provider.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self { transport, config })
    }

    /// Provider configured from `SMTP_*` environment variables.
    pub fn from_env() -> NotificationResult<Self> {
        Self::new(SmtpConfig::from_env())
    }

    fn build_transport(
        config: &SmtpConfig,
    ) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let transport = if config.use_tls {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| {
                    NotificationError::Provider(format!("Failed to create SMTP relay: {}", e))
                })?
                .port(config.port);

            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }

            builder.build()
        } else {
            let mut builder =
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                    .port(config.port);

            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }

            builder.build()
        };

        Ok(transport)
    }

    fn build_message(&self, email: &EmailMessage) -> NotificationResult<Message> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| NotificationError::Provider(format!("Invalid from address: {}", e)))?;

        let to: Mailbox = if email.to_name.is_empty() {
            email.to_email.parse()
        } else {
            format!("{} <{}>", email.to_name, email.to_email).parse()
        }
        .map_err(|e| NotificationError::Provider(format!("Invalid to address: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| {
                NotificationError::Provider(format!("Failed to build email message: {}", e))
            })?;

        Ok(message)
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailMessage) -> NotificationResult<SentEmail> {
        debug!(
            to = %email.to_email,
            subject = %email.subject,
            host = %self.config.host,
            port = %self.config.port,
            "Sending email via SMTP"
        );

        let message = self.build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(to = %email.to_email, error = %e, "Failed to send email via SMTP");
            NotificationError::Provider(format!("SMTP send failed: {}", e))
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        info!(
            to = %email.to_email,
            message_id = ?message_id,
            "Email sent via SMTP"
        );

        Ok(SentEmail {
            message_id,
            accepted: true,
        })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        self.transport.test_connection().await.map_err(|e| {
            NotificationError::Provider(format!("SMTP health check failed: {}", e))
        })?;
        Ok(true)
    }
}
