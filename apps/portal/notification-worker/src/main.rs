//! Notification Worker - Entry Point
//!
//! Background worker that processes the portal's notification and email
//! queues.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    portal_notification_worker::run().await
}
