//! Preference resolver: per-(user, kind) delivery control.

use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::error::NotificationResult;
use crate::models::{NotificationKind, NotificationPreference, PreferenceUpdate};
use crate::repository::PreferenceRepository;

/// Service over the preference store.
#[derive(Clone)]
pub struct NotificationPreferenceService {
    repository: Arc<dyn PreferenceRepository>,
}

impl NotificationPreferenceService {
    pub fn new(repository: Arc<dyn PreferenceRepository>) -> Self {
        Self { repository }
    }

    /// All preference rows of a user.
    pub async fn get_user_preferences(
        &self,
        user_id: i64,
    ) -> NotificationResult<Vec<NotificationPreference>> {
        self.repository.list_for_user(user_id).await
    }

    /// The preference row for `(user_id, kind)`, if any.
    pub async fn get_preference(
        &self,
        user_id: i64,
        kind: NotificationKind,
    ) -> NotificationResult<Option<NotificationPreference>> {
        self.repository.find(user_id, kind).await
    }

    /// Upsert a preference row (last-writer-wins on the composite key).
    pub async fn update_preference(
        &self,
        update: PreferenceUpdate,
    ) -> NotificationResult<NotificationPreference> {
        debug!(
            user_id = update.user_id,
            kind = %update.kind,
            channel = %update.channel,
            enabled = update.enabled,
            "Updating notification preference"
        );
        self.repository.upsert(update).await
    }

    /// Seed default preferences for every known kind a user is missing.
    ///
    /// Called once by account provisioning; safe to call again. Existing
    /// rows are never overwritten, so a re-run only fills gaps (e.g. kinds
    /// added after the user was provisioned).
    pub async fn initialize_user_preferences(&self, user_id: i64) -> NotificationResult<u64> {
        let defaults = NotificationKind::iter()
            .map(|kind| NotificationPreference::default_for(user_id, kind))
            .collect();

        let inserted = self.repository.insert_missing(user_id, defaults).await?;

        info!(
            user_id,
            inserted, "Initialized notification preferences for user"
        );
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationChannel;
    use crate::repository::InMemoryPreferenceRepository;
    use strum::IntoEnumIterator;

    fn service() -> NotificationPreferenceService {
        NotificationPreferenceService::new(Arc::new(InMemoryPreferenceRepository::new()))
    }

    #[tokio::test]
    async fn test_initialize_seeds_every_kind() {
        let service = service();

        let inserted = service.initialize_user_preferences(1).await.unwrap();
        assert_eq!(inserted as usize, NotificationKind::iter().count());

        let prefs = service.get_user_preferences(1).await.unwrap();
        assert_eq!(prefs.len(), NotificationKind::iter().count());
        assert!(prefs.iter().all(|p| p.enabled));
        assert!(prefs
            .iter()
            .all(|p| p.channel == NotificationChannel::Both));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let service = service();

        service.initialize_user_preferences(1).await.unwrap();
        let second = service.initialize_user_preferences(1).await.unwrap();

        assert_eq!(second, 0);
        assert_eq!(
            service.get_user_preferences(1).await.unwrap().len(),
            NotificationKind::iter().count()
        );
    }

    #[tokio::test]
    async fn test_initialize_preserves_customized_rows() {
        let service = service();

        service
            .update_preference(PreferenceUpdate {
                user_id: 1,
                kind: NotificationKind::EventReminder,
                channel: NotificationChannel::Email,
                enabled: false,
            })
            .await
            .unwrap();

        service.initialize_user_preferences(1).await.unwrap();

        let pref = service
            .get_preference(1, NotificationKind::EventReminder)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pref.channel, NotificationChannel::Email);
        assert!(!pref.enabled);
    }

    #[tokio::test]
    async fn test_get_preference_missing_is_none() {
        let service = service();
        let pref = service
            .get_preference(42, NotificationKind::PostLiked)
            .await
            .unwrap();
        assert!(pref.is_none());
    }
}
