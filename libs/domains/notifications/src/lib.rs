//! Notifications Domain
//!
//! Persisted notifications with preference-gated multi-channel delivery
//! for the employee portal.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ Business services /  │  ← enqueue jobs (post liked, event created, ...)
//! │ cron schedulers      │
//! └──────────┬───────────┘
//!            │ QueueManager::add_job
//! ┌──────────▼───────────┐
//! │ notifications /      │  ← durable Redis streams
//! │ emails queues        │
//! └──────────┬───────────┘
//!            │ per-kind handlers (handlers::*)
//! ┌──────────▼───────────┐
//! │ NotificationService  │  ← persists the row, then dispatches
//! └──────────┬───────────┘
//!            │ preference for (recipient, kind)
//!     ┌──────┴───────┐
//! ┌───▼────┐    ┌────▼────┐
//! │Realtime│    │  Email  │  ← independent channel adapters
//! └────────┘    └─────────┘
//! ```
//!
//! Persistence and delivery are separate concerns: a recipient who
//! disabled a notification kind still has the event recorded (and
//! countable via the unread surface) but receives no channel delivery.

pub mod channels;
pub mod directory;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod mailer;
pub mod models;
pub mod postgres;
pub mod preferences;
pub mod providers;
pub mod repository;
pub mod service;
pub mod templates;

// Re-export commonly used types
pub use channels::{DeliveryChannel, EmailChannel, RealtimeChannel, SessionRegistry};
pub use directory::{
    EmployeeDirectory, InMemoryEmployeeDirectory, InMemoryRecipientDirectory, RecipientDirectory,
};
pub use error::{NotificationError, NotificationResult};
pub use handlers::{email_handlers, notification_handlers, EmailJobs, NotificationJobs};
pub use jobs::{JobKind, QueueName};
pub use mailer::{EmailTemplates, RenderedEmail};
pub use models::{
    Notification, NotificationChannel, NotificationKind, NotificationPayload,
    NotificationPreference, PreferenceUpdate,
};
pub use postgres::{PgNotificationRepository, PgPreferenceRepository};
pub use preferences::NotificationPreferenceService;
pub use providers::{EmailMessage, EmailProvider, SentEmail, SmtpConfig, SmtpProvider};
pub use repository::{
    InMemoryNotificationRepository, InMemoryPreferenceRepository, NotificationRepository,
    PreferenceRepository,
};
pub use service::NotificationService;
pub use templates::NotificationTemplates;
