//! Repository traits for the notification store, plus in-memory
//! implementations used by tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{NotificationError, NotificationResult};
use crate::models::{
    Notification, NotificationKind, NotificationPayload, NotificationPreference, PreferenceUpdate,
};

/// Persistence for notification records.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist a new notification (unread).
    async fn insert(&self, payload: &NotificationPayload) -> NotificationResult<Notification>;

    /// Fetch a notification by id.
    async fn find_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>>;

    /// Flip the read flag of one notification; `NotFound` for unknown ids.
    async fn mark_read(&self, id: Uuid) -> NotificationResult<Notification>;

    /// Mark every notification of a user read; returns the number updated.
    async fn mark_all_read(&self, user_id: i64) -> NotificationResult<u64>;

    /// All notifications for a user, newest first.
    async fn list_for_user(&self, user_id: i64) -> NotificationResult<Vec<Notification>>;

    /// Count of unread notifications for a user.
    async fn unread_count(&self, user_id: i64) -> NotificationResult<u64>;
}

/// Persistence for preference rows keyed by `(user_id, kind)`.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn list_for_user(&self, user_id: i64)
        -> NotificationResult<Vec<NotificationPreference>>;

    async fn find(
        &self,
        user_id: i64,
        kind: NotificationKind,
    ) -> NotificationResult<Option<NotificationPreference>>;

    /// Atomic upsert on the composite key, last-writer-wins.
    async fn upsert(&self, update: PreferenceUpdate) -> NotificationResult<NotificationPreference>;

    /// Insert only rows whose `(user_id, kind)` does not exist yet.
    /// Existing rows are never overwritten. Returns the inserted count.
    async fn insert_missing(
        &self,
        user_id: i64,
        defaults: Vec<NotificationPreference>,
    ) -> NotificationResult<u64>;
}

/// In-memory notification store (tests and local development).
#[derive(Default, Clone)]
pub struct InMemoryNotificationRepository {
    rows: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, payload: &NotificationPayload) -> NotificationResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: payload.recipient_id,
            sender_id: payload.sender_id,
            kind: payload.kind,
            title: payload.title.clone(),
            content: payload.content.clone(),
            data: payload.data.clone(),
            read: false,
            created_at: Utc::now(),
        };

        self.rows.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn find_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>> {
        Ok(self.rows.read().await.iter().find(|n| n.id == id).cloned())
    }

    async fn mark_read(&self, id: Uuid) -> NotificationResult<Notification> {
        let mut rows = self.rows.write().await;
        let notification = rows
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(NotificationError::NotFound(id))?;
        notification.read = true;
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, user_id: i64) -> NotificationResult<u64> {
        let mut rows = self.rows.write().await;
        let mut updated = 0;
        for notification in rows.iter_mut().filter(|n| n.recipient_id == user_id) {
            if !notification.read {
                notification.read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn list_for_user(&self, user_id: i64) -> NotificationResult<Vec<Notification>> {
        let rows = self.rows.read().await;
        // Insertion order is creation order; reversing gives newest first
        // even when timestamps collide.
        Ok(rows
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .rev()
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user_id: i64) -> NotificationResult<u64> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|n| n.recipient_id == user_id && !n.read)
            .count() as u64)
    }
}

/// In-memory preference store (tests and local development).
#[derive(Default, Clone)]
pub struct InMemoryPreferenceRepository {
    rows: Arc<RwLock<HashMap<(i64, NotificationKind), NotificationPreference>>>,
}

impl InMemoryPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn list_for_user(
        &self,
        user_id: i64,
    ) -> NotificationResult<Vec<NotificationPreference>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find(
        &self,
        user_id: i64,
        kind: NotificationKind,
    ) -> NotificationResult<Option<NotificationPreference>> {
        Ok(self.rows.read().await.get(&(user_id, kind)).cloned())
    }

    async fn upsert(&self, update: PreferenceUpdate) -> NotificationResult<NotificationPreference> {
        let preference = NotificationPreference {
            user_id: update.user_id,
            kind: update.kind,
            channel: update.channel,
            enabled: update.enabled,
            updated_at: Utc::now(),
        };

        self.rows
            .write()
            .await
            .insert((update.user_id, update.kind), preference.clone());
        Ok(preference)
    }

    async fn insert_missing(
        &self,
        user_id: i64,
        defaults: Vec<NotificationPreference>,
    ) -> NotificationResult<u64> {
        let mut rows = self.rows.write().await;
        let mut inserted = 0;

        for preference in defaults {
            let key = (user_id, preference.kind);
            if !rows.contains_key(&key) {
                rows.insert(key, preference);
                inserted += 1;
            }
        }

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationChannel;
    use serde_json::json;

    fn payload(recipient_id: i64) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::PostLiked,
            recipient_id,
            sender_id: Some(2),
            title: "New Like on Your Post".to_string(),
            content: "ama liked your post".to_string(),
            data: json!({"post_id": 10}),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_newest_first() {
        let repo = InMemoryNotificationRepository::new();

        let first = repo.insert(&payload(1)).await.unwrap();
        let second = repo.insert(&payload(1)).await.unwrap();
        repo.insert(&payload(99)).await.unwrap();

        let listed = repo.list_for_user(1).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_mark_read_and_unread_count() {
        let repo = InMemoryNotificationRepository::new();

        let a = repo.insert(&payload(1)).await.unwrap();
        repo.insert(&payload(1)).await.unwrap();

        assert_eq!(repo.unread_count(1).await.unwrap(), 2);

        repo.mark_read(a.id).await.unwrap();
        assert_eq!(repo.unread_count(1).await.unwrap(), 1);

        let updated = repo.mark_all_read(1).await.unwrap();
        assert_eq!(updated, 1);
        assert_eq!(repo.unread_count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id_is_not_found() {
        let repo = InMemoryNotificationRepository::new();
        let err = repo.mark_read(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_preference_upsert_is_last_writer_wins() {
        let repo = InMemoryPreferenceRepository::new();

        repo.upsert(PreferenceUpdate {
            user_id: 1,
            kind: NotificationKind::PostLiked,
            channel: NotificationChannel::Email,
            enabled: true,
        })
        .await
        .unwrap();

        repo.upsert(PreferenceUpdate {
            user_id: 1,
            kind: NotificationKind::PostLiked,
            channel: NotificationChannel::InApp,
            enabled: false,
        })
        .await
        .unwrap();

        let found = repo
            .find(1, NotificationKind::PostLiked)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.channel, NotificationChannel::InApp);
        assert!(!found.enabled);

        // Still one row for the key.
        assert_eq!(repo.list_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_missing_never_overwrites() {
        let repo = InMemoryPreferenceRepository::new();

        repo.upsert(PreferenceUpdate {
            user_id: 1,
            kind: NotificationKind::PostLiked,
            channel: NotificationChannel::Email,
            enabled: false,
        })
        .await
        .unwrap();

        let inserted = repo
            .insert_missing(
                1,
                vec![
                    NotificationPreference::default_for(1, NotificationKind::PostLiked),
                    NotificationPreference::default_for(1, NotificationKind::PollCreated),
                ],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        // The customized row survived the seed.
        let survived = repo
            .find(1, NotificationKind::PostLiked)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(survived.channel, NotificationChannel::Email);
        assert!(!survived.enabled);
    }
}
