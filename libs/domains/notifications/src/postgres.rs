//! SeaORM-backed repositories for the notification store.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use std::collections::HashSet;
use uuid::Uuid;

use crate::entity::{notification, preference};
use crate::error::{NotificationError, NotificationResult};
use crate::models::{
    Notification, NotificationKind, NotificationPayload, NotificationPreference, PreferenceUpdate,
};
use crate::repository::{NotificationRepository, PreferenceRepository};

fn notification_from_model(model: notification::Model) -> NotificationResult<Notification> {
    let kind = model.kind.parse::<NotificationKind>().map_err(|_| {
        NotificationError::Internal(format!("unknown notification kind '{}'", model.kind))
    })?;

    Ok(Notification {
        id: model.id,
        recipient_id: model.recipient_id,
        sender_id: model.sender_id,
        kind,
        title: model.title,
        content: model.content,
        data: model.data.unwrap_or(serde_json::Value::Null),
        read: model.read,
        created_at: model.created_at.into(),
    })
}

fn preference_from_model(model: preference::Model) -> NotificationResult<NotificationPreference> {
    let kind = model.kind.parse::<NotificationKind>().map_err(|_| {
        NotificationError::Internal(format!("unknown notification kind '{}'", model.kind))
    })?;
    let channel = model.channel.parse().map_err(|_| {
        NotificationError::Internal(format!("unknown channel '{}'", model.channel))
    })?;

    Ok(NotificationPreference {
        user_id: model.user_id,
        kind,
        channel,
        enabled: model.enabled,
        updated_at: model.updated_at.into(),
    })
}

/// Notification store over PostgreSQL.
pub struct PgNotificationRepository {
    db: DatabaseConnection,
}

impl PgNotificationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, payload: &NotificationPayload) -> NotificationResult<Notification> {
        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            recipient_id: Set(payload.recipient_id),
            sender_id: Set(payload.sender_id),
            kind: Set(payload.kind.to_string()),
            title: Set(payload.title.clone()),
            content: Set(payload.content.clone()),
            data: Set(Some(payload.data.clone())),
            read: Set(false),
            created_at: Set(Utc::now().into()),
        };

        let inserted = model.insert(&self.db).await?;
        notification_from_model(inserted)
    }

    async fn find_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>> {
        let model = notification::Entity::find_by_id(id).one(&self.db).await?;
        model.map(notification_from_model).transpose()
    }

    async fn mark_read(&self, id: Uuid) -> NotificationResult<Notification> {
        let model = notification::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(NotificationError::NotFound(id))?;

        let mut active: notification::ActiveModel = model.into();
        active.read = Set(true);
        let updated = active.update(&self.db).await?;

        notification_from_model(updated)
    }

    async fn mark_all_read(&self, user_id: i64) -> NotificationResult<u64> {
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .filter(notification::Column::RecipientId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    async fn list_for_user(&self, user_id: i64) -> NotificationResult<Vec<Notification>> {
        let models = notification::Entity::find()
            .filter(notification::Column::RecipientId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .all(&self.db)
            .await?;

        models.into_iter().map(notification_from_model).collect()
    }

    async fn unread_count(&self, user_id: i64) -> NotificationResult<u64> {
        let count = notification::Entity::find()
            .filter(notification::Column::RecipientId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}

/// Preference store over PostgreSQL.
pub struct PgPreferenceRepository {
    db: DatabaseConnection,
}

impl PgPreferenceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PreferenceRepository for PgPreferenceRepository {
    async fn list_for_user(
        &self,
        user_id: i64,
    ) -> NotificationResult<Vec<NotificationPreference>> {
        let models = preference::Entity::find()
            .filter(preference::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?;

        models.into_iter().map(preference_from_model).collect()
    }

    async fn find(
        &self,
        user_id: i64,
        kind: NotificationKind,
    ) -> NotificationResult<Option<NotificationPreference>> {
        let model = preference::Entity::find_by_id((user_id, kind.to_string()))
            .one(&self.db)
            .await?;

        model.map(preference_from_model).transpose()
    }

    async fn upsert(&self, update: PreferenceUpdate) -> NotificationResult<NotificationPreference> {
        let now = Utc::now();
        let model = preference::ActiveModel {
            user_id: Set(update.user_id),
            kind: Set(update.kind.to_string()),
            channel: Set(update.channel.to_string()),
            enabled: Set(update.enabled),
            updated_at: Set(now.into()),
        };

        // Native atomic upsert on the composite key, last-writer-wins.
        preference::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([preference::Column::UserId, preference::Column::Kind])
                    .update_columns([
                        preference::Column::Channel,
                        preference::Column::Enabled,
                        preference::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(NotificationPreference {
            user_id: update.user_id,
            kind: update.kind,
            channel: update.channel,
            enabled: update.enabled,
            updated_at: now,
        })
    }

    async fn insert_missing(
        &self,
        user_id: i64,
        defaults: Vec<NotificationPreference>,
    ) -> NotificationResult<u64> {
        let existing: HashSet<String> = preference::Entity::find()
            .filter(preference::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.kind)
            .collect();

        let mut inserted = 0u64;
        for pref in defaults {
            if existing.contains(pref.kind.as_ref()) {
                continue;
            }

            let model = preference::ActiveModel {
                user_id: Set(user_id),
                kind: Set(pref.kind.to_string()),
                channel: Set(pref.channel.to_string()),
                enabled: Set(pref.enabled),
                updated_at: Set(pref.updated_at.into()),
            };

            // DO NOTHING covers a concurrent seeder racing us on the key.
            preference::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([preference::Column::UserId, preference::Column::Kind])
                        .do_nothing()
                        .to_owned(),
                )
                .do_nothing()
                .exec(&self.db)
                .await?;
            inserted += 1;
        }

        Ok(inserted)
    }
}
