//! Realtime push channel.
//!
//! Tracks live sessions per user and pushes serialized payloads to every
//! connected session. A recipient with no live session simply does not
//! receive the push; the persisted notification is the durable record
//! they catch up from.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::debug;

use super::DeliveryChannel;
use crate::error::NotificationResult;
use crate::models::NotificationPayload;

/// Live sessions per user id.
///
/// A user can hold several sessions at once (multiple tabs/devices); each
/// registers its own sender. Senders whose receiving side has gone away
/// are pruned on the next push.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<i64, Vec<mpsc::UnboundedSender<serde_json::Value>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live session for a user; the returned receiver gets
    /// every pushed payload until it is dropped.
    pub async fn connect(&self, user_id: i64) -> mpsc::UnboundedReceiver<serde_json::Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.write().await.entry(user_id).or_default().push(tx);

        debug!(user_id, "Registered realtime session");
        rx
    }

    /// Push a payload to every live session of a user.
    ///
    /// Returns the number of sessions that received it (0 when offline).
    pub async fn push(&self, user_id: i64, payload: serde_json::Value) -> usize {
        let mut sessions = self.sessions.write().await;

        let Some(senders) = sessions.get_mut(&user_id) else {
            return 0;
        };

        let mut delivered = 0;
        senders.retain(|tx| match tx.send(payload.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            // Receiver dropped: the session disconnected
            Err(_) => false,
        });

        if senders.is_empty() {
            sessions.remove(&user_id);
        }

        delivered
    }

    /// Number of users with at least one live session.
    pub async fn connected_users(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Realtime push adapter over the session registry.
pub struct RealtimeChannel {
    registry: Arc<SessionRegistry>,
}

impl RealtimeChannel {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl DeliveryChannel for RealtimeChannel {
    async fn send(&self, payload: &NotificationPayload) -> NotificationResult<()> {
        let message = json!({
            "kind": payload.kind,
            "title": payload.title,
            "content": payload.content,
            "sender_id": payload.sender_id,
            "data": payload.data,
        });

        let delivered = self.registry.push(payload.recipient_id, message).await;

        if delivered == 0 {
            // Offline recipients are an expected no-op, not a failure.
            debug!(
                recipient_id = payload.recipient_id,
                kind = %payload.kind,
                "Recipient has no live session, dropping realtime push"
            );
        } else {
            debug!(
                recipient_id = payload.recipient_id,
                kind = %payload.kind,
                sessions = delivered,
                "Pushed notification to live sessions"
            );
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "realtime"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;

    fn payload(recipient_id: i64) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::PostLiked,
            recipient_id,
            sender_id: Some(2),
            title: "New Like on Your Post".to_string(),
            content: "ama liked your post".to_string(),
            data: serde_json::json!({"post_id": 10}),
        }
    }

    #[tokio::test]
    async fn test_push_reaches_every_session() {
        let registry = Arc::new(SessionRegistry::new());
        let mut rx1 = registry.connect(1).await;
        let mut rx2 = registry.connect(1).await;

        let channel = RealtimeChannel::new(registry);
        channel.send(&payload(1)).await.unwrap();

        let m1 = rx1.recv().await.unwrap();
        let m2 = rx2.recv().await.unwrap();
        assert_eq!(m1["kind"], "post_liked");
        assert_eq!(m1, m2);
    }

    #[tokio::test]
    async fn test_offline_recipient_is_a_noop() {
        let registry = Arc::new(SessionRegistry::new());
        let channel = RealtimeChannel::new(registry);

        // Nobody connected: must not error.
        channel.send(&payload(42)).await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnected_sessions_are_pruned() {
        let registry = Arc::new(SessionRegistry::new());

        let rx = registry.connect(1).await;
        drop(rx);

        assert_eq!(registry.push(1, serde_json::json!({})).await, 0);
        assert_eq!(registry.connected_users().await, 0);
    }

    #[tokio::test]
    async fn test_push_does_not_cross_users() {
        let registry = Arc::new(SessionRegistry::new());
        let mut rx_other = registry.connect(2).await;

        let channel = RealtimeChannel::new(registry);
        channel.send(&payload(1)).await.unwrap();

        assert!(rx_other.try_recv().is_err());
    }
}
