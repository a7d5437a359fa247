//! Integration tests for the notification store against real PostgreSQL.
//!
//! These use testcontainers to verify the SeaORM repositories: insert and
//! read ordering, the read-flag surface, and the preference upsert /
//! idempotent-seed semantics on the composite key.

use domain_notifications::{
    NotificationChannel, NotificationKind, NotificationPayload, NotificationPreferenceService,
    NotificationRepository, PgNotificationRepository, PgPreferenceRepository, PreferenceUpdate,
};
use serde_json::json;
use std::sync::Arc;
use strum::IntoEnumIterator;
use test_utils::{TestDataBuilder, TestDatabase};
use uuid::Uuid;

fn payload(recipient_id: i64, kind: NotificationKind, content: &str) -> NotificationPayload {
    NotificationPayload {
        kind,
        recipient_id,
        sender_id: Some(recipient_id + 1),
        title: "Test".to_string(),
        content: content.to_string(),
        data: json!({"n": 1}),
    }
}

#[tokio::test]
async fn test_insert_list_and_read_flags() {
    let db = TestDatabase::new().await;
    let repo = PgNotificationRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("insert_list_read");
    let user = builder.user_id();

    let first = repo
        .insert(&payload(user, NotificationKind::PostLiked, "first"))
        .await
        .unwrap();
    let second = repo
        .insert(&payload(user, NotificationKind::PollCreated, "second"))
        .await
        .unwrap();
    // A different recipient's rows never leak into the listing.
    repo.insert(&payload(builder.other_user_id(), NotificationKind::PostLiked, "other"))
        .await
        .unwrap();

    let listed = repo.list_for_user(user).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|n| !n.read));

    assert_eq!(repo.unread_count(user).await.unwrap(), 2);

    let updated = repo.mark_read(first.id).await.unwrap();
    assert!(updated.read);
    assert_eq!(repo.unread_count(user).await.unwrap(), 1);

    let affected = repo.mark_all_read(user).await.unwrap();
    assert_eq!(affected, 1);
    assert_eq!(repo.unread_count(user).await.unwrap(), 0);

    // Round-trips preserve the stored fields.
    let fetched = repo.find_by_id(second.id).await.unwrap().unwrap();
    assert_eq!(fetched.kind, NotificationKind::PollCreated);
    assert_eq!(fetched.content, "second");
    assert_eq!(fetched.data, json!({"n": 1}));
}

#[tokio::test]
async fn test_mark_read_unknown_id_is_not_found() {
    let db = TestDatabase::new().await;
    let repo = PgNotificationRepository::new(db.connection());

    let result = repo.mark_read(Uuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(domain_notifications::NotificationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_preference_seed_is_idempotent() {
    let db = TestDatabase::new().await;
    let service =
        NotificationPreferenceService::new(Arc::new(PgPreferenceRepository::new(db.connection())));
    let builder = TestDataBuilder::from_test_name("pref_seed");
    let user = builder.user_id();

    let first = service.initialize_user_preferences(user).await.unwrap();
    assert_eq!(first as usize, NotificationKind::iter().count());

    let second = service.initialize_user_preferences(user).await.unwrap();
    assert_eq!(second, 0);

    let prefs = service.get_user_preferences(user).await.unwrap();
    assert_eq!(prefs.len(), NotificationKind::iter().count());
    assert!(prefs.iter().all(|p| p.enabled && p.channel == NotificationChannel::Both));
}

#[tokio::test]
async fn test_preference_upsert_replaces_on_composite_key() {
    let db = TestDatabase::new().await;
    let service =
        NotificationPreferenceService::new(Arc::new(PgPreferenceRepository::new(db.connection())));
    let builder = TestDataBuilder::from_test_name("pref_upsert");
    let user = builder.user_id();

    service
        .update_preference(PreferenceUpdate {
            user_id: user,
            kind: NotificationKind::EventReminder,
            channel: NotificationChannel::Email,
            enabled: true,
        })
        .await
        .unwrap();

    service
        .update_preference(PreferenceUpdate {
            user_id: user,
            kind: NotificationKind::EventReminder,
            channel: NotificationChannel::InApp,
            enabled: false,
        })
        .await
        .unwrap();

    // Still exactly one row, holding the last write.
    let prefs = service.get_user_preferences(user).await.unwrap();
    assert_eq!(prefs.len(), 1);
    assert_eq!(prefs[0].channel, NotificationChannel::InApp);
    assert!(!prefs[0].enabled);

    // Seeding afterwards must not resurrect the default for this kind.
    service.initialize_user_preferences(user).await.unwrap();
    let pref = service
        .get_preference(user, NotificationKind::EventReminder)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pref.channel, NotificationChannel::InApp);
}
