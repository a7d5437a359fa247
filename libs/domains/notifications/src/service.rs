//! Notification orchestrator.
//!
//! Persists every notification first, unconditionally, then attempts
//! preference-gated delivery. Persistence and delivery stay separate:
//! a recipient with the kind disabled (or with no seeded preference row)
//! still has the event recorded and countable, but no channel adapter is
//! invoked.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::channels::DeliveryChannel;
use crate::error::NotificationResult;
use crate::models::{Notification, NotificationPayload};
use crate::preferences::NotificationPreferenceService;
use crate::repository::NotificationRepository;

/// Orchestrates persistence and fan-out of notifications.
#[derive(Clone)]
pub struct NotificationService {
    repository: Arc<dyn NotificationRepository>,
    preferences: NotificationPreferenceService,
    realtime: Arc<dyn DeliveryChannel>,
    email: Arc<dyn DeliveryChannel>,
}

impl NotificationService {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        preferences: NotificationPreferenceService,
        realtime: Arc<dyn DeliveryChannel>,
        email: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            repository,
            preferences,
            realtime,
            email,
        }
    }

    /// Persist a notification, then attempt delivery.
    ///
    /// Delivery failures are contained: they are logged per adapter and
    /// never propagate to the caller, so the stored record (and the
    /// business operation that triggered it) is unaffected.
    pub async fn create_notification(
        &self,
        payload: NotificationPayload,
    ) -> NotificationResult<Notification> {
        let notification = self.repository.insert(&payload).await?;

        debug!(
            notification_id = %notification.id,
            recipient_id = payload.recipient_id,
            kind = %payload.kind,
            "Persisted notification"
        );

        self.dispatch(&payload).await;

        Ok(notification)
    }

    /// Resolve the recipient's preference and fan out to the channels it
    /// selects. No row, or a disabled row, means no delivery at all.
    async fn dispatch(&self, payload: &NotificationPayload) {
        let preference = match self
            .preferences
            .get_preference(payload.recipient_id, payload.kind)
            .await
        {
            Ok(preference) => preference,
            Err(e) => {
                warn!(
                    recipient_id = payload.recipient_id,
                    kind = %payload.kind,
                    error = %e,
                    "Failed to resolve notification preference, skipping delivery"
                );
                return;
            }
        };

        let Some(preference) = preference else {
            debug!(
                recipient_id = payload.recipient_id,
                kind = %payload.kind,
                "No preference row for recipient, skipping delivery"
            );
            return;
        };

        if !preference.enabled {
            debug!(
                recipient_id = payload.recipient_id,
                kind = %payload.kind,
                "Notification kind disabled by recipient, skipping delivery"
            );
            return;
        }

        // The two sends are independent: a failure in one is logged and
        // must not prevent (or be masked by) the other.
        if preference.channel.includes_in_app() {
            self.send_via(self.realtime.as_ref(), payload).await;
        }

        if preference.channel.includes_email() {
            self.send_via(self.email.as_ref(), payload).await;
        }
    }

    async fn send_via(&self, channel: &dyn DeliveryChannel, payload: &NotificationPayload) {
        if let Err(e) = channel.send(payload).await {
            warn!(
                channel = channel.name(),
                recipient_id = payload.recipient_id,
                kind = %payload.kind,
                error = %e,
                "Channel delivery failed"
            );
        }
    }

    /// Mark one notification read; `NotFound` for unknown ids.
    pub async fn mark_as_read(&self, id: Uuid) -> NotificationResult<Notification> {
        self.repository.mark_read(id).await
    }

    /// Mark all of a user's notifications read; returns the number updated.
    pub async fn mark_all_as_read(&self, user_id: i64) -> NotificationResult<u64> {
        self.repository.mark_all_read(user_id).await
    }

    /// All notifications for a user, newest first.
    pub async fn get_user_notifications(
        &self,
        user_id: i64,
    ) -> NotificationResult<Vec<Notification>> {
        self.repository.list_for_user(user_id).await
    }

    /// Count of unread notifications for a user.
    pub async fn get_unread_count(&self, user_id: i64) -> NotificationResult<u64> {
        self.repository.unread_count(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MockDeliveryChannel;
    use crate::error::NotificationError;
    use crate::models::{NotificationChannel, NotificationKind, PreferenceUpdate};
    use crate::repository::{InMemoryNotificationRepository, InMemoryPreferenceRepository};
    use serde_json::json;

    fn payload(recipient_id: i64, kind: NotificationKind) -> NotificationPayload {
        NotificationPayload {
            kind,
            recipient_id,
            sender_id: Some(9),
            title: "Test".to_string(),
            content: "test content".to_string(),
            data: json!({}),
        }
    }

    struct Fixture {
        service: NotificationService,
        preferences: NotificationPreferenceService,
    }

    /// Build a service with mock channels expecting the given call counts.
    fn fixture(realtime_calls: usize, email_calls: usize) -> Fixture {
        let mut realtime = MockDeliveryChannel::new();
        realtime.expect_name().return_const("realtime");
        realtime
            .expect_send()
            .times(realtime_calls)
            .returning(|_| Ok(()));

        let mut email = MockDeliveryChannel::new();
        email.expect_name().return_const("email");
        email.expect_send().times(email_calls).returning(|_| Ok(()));

        let preferences =
            NotificationPreferenceService::new(Arc::new(InMemoryPreferenceRepository::new()));

        let service = NotificationService::new(
            Arc::new(InMemoryNotificationRepository::new()),
            preferences.clone(),
            Arc::new(realtime),
            Arc::new(email),
        );

        Fixture {
            service,
            preferences,
        }
    }

    async fn set_preference(
        fixture: &Fixture,
        user_id: i64,
        kind: NotificationKind,
        channel: NotificationChannel,
        enabled: bool,
    ) {
        fixture
            .preferences
            .update_preference(PreferenceUpdate {
                user_id,
                kind,
                channel,
                enabled,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_both_channel_invokes_both_adapters_once() {
        let fixture = fixture(1, 1);
        set_preference(
            &fixture,
            1,
            NotificationKind::PostLiked,
            NotificationChannel::Both,
            true,
        )
        .await;

        fixture
            .service
            .create_notification(payload(1, NotificationKind::PostLiked))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_preference_row_persists_but_never_delivers() {
        let fixture = fixture(0, 0);

        fixture
            .service
            .create_notification(payload(1, NotificationKind::PostLiked))
            .await
            .unwrap();

        // The row exists and is countable despite zero deliveries.
        assert_eq!(fixture.service.get_unread_count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disabled_preference_suppresses_every_channel() {
        let fixture = fixture(0, 0);
        set_preference(
            &fixture,
            1,
            NotificationKind::PostLiked,
            NotificationChannel::Both,
            false,
        )
        .await;

        fixture
            .service
            .create_notification(payload(1, NotificationKind::PostLiked))
            .await
            .unwrap();

        assert_eq!(fixture.service.get_unread_count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_in_app_only_preference() {
        let fixture = fixture(1, 0);
        set_preference(
            &fixture,
            1,
            NotificationKind::PostLiked,
            NotificationChannel::InApp,
            true,
        )
        .await;

        fixture
            .service
            .create_notification(payload(1, NotificationKind::PostLiked))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_preference_change_flips_delivered_channel() {
        // First dispatch goes to email only, then the user switches to
        // in-app only: the next dispatch must hit only the realtime adapter.
        let fixture = fixture(1, 1);
        set_preference(
            &fixture,
            1,
            NotificationKind::PostLiked,
            NotificationChannel::Email,
            true,
        )
        .await;

        fixture
            .service
            .create_notification(payload(1, NotificationKind::PostLiked))
            .await
            .unwrap();

        set_preference(
            &fixture,
            1,
            NotificationKind::PostLiked,
            NotificationChannel::InApp,
            true,
        )
        .await;

        fixture
            .service
            .create_notification(payload(1, NotificationKind::PostLiked))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_one_channel_failing_does_not_block_the_other() {
        let mut realtime = MockDeliveryChannel::new();
        realtime.expect_name().return_const("realtime");
        realtime
            .expect_send()
            .times(1)
            .returning(|_| Err(NotificationError::delivery("realtime", "socket gone")));

        let mut email = MockDeliveryChannel::new();
        email.expect_name().return_const("email");
        email.expect_send().times(1).returning(|_| Ok(()));

        let preferences =
            NotificationPreferenceService::new(Arc::new(InMemoryPreferenceRepository::new()));
        preferences
            .update_preference(PreferenceUpdate {
                user_id: 1,
                kind: NotificationKind::PostLiked,
                channel: NotificationChannel::Both,
                enabled: true,
            })
            .await
            .unwrap();

        let service = NotificationService::new(
            Arc::new(InMemoryNotificationRepository::new()),
            preferences,
            Arc::new(realtime),
            Arc::new(email),
        );

        // Creation itself must succeed even though a channel failed.
        service
            .create_notification(payload(1, NotificationKind::PostLiked))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_surface_roundtrip() {
        let fixture = fixture(0, 0);

        let a = fixture
            .service
            .create_notification(payload(1, NotificationKind::PostLiked))
            .await
            .unwrap();
        fixture
            .service
            .create_notification(payload(1, NotificationKind::PollCreated))
            .await
            .unwrap();

        assert_eq!(fixture.service.get_unread_count(1).await.unwrap(), 2);

        let listed = fixture.service.get_user_notifications(1).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kind, NotificationKind::PollCreated);

        fixture.service.mark_as_read(a.id).await.unwrap();
        assert_eq!(fixture.service.get_unread_count(1).await.unwrap(), 1);

        fixture.service.mark_all_as_read(1).await.unwrap();
        assert_eq!(fixture.service.get_unread_count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_as_read_unknown_id() {
        let fixture = fixture(0, 0);
        let err = fixture
            .service
            .mark_as_read(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(_)));
    }
}
