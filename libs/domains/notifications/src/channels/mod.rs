//! Delivery channel adapters.
//!
//! Every channel exposes the same `send(payload)` contract. Expected
//! no-op cases (recipient offline, no email address on file) return `Ok`;
//! real transport failures surface as errors for the orchestrator to log
//! and contain.

mod email;
mod realtime;

pub use email::EmailChannel;
pub use realtime::{RealtimeChannel, SessionRegistry};

use crate::error::NotificationResult;
use crate::models::NotificationPayload;
use async_trait::async_trait;

/// Uniform contract for notification delivery channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver one notification payload.
    async fn send(&self, payload: &NotificationPayload) -> NotificationResult<()>;

    /// Channel name for logging.
    fn name(&self) -> &'static str;
}
