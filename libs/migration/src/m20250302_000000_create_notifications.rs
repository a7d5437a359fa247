use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(pk_uuid(Notifications::Id))
                    .col(
                        ColumnDef::new(Notifications::RecipientId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notifications::SenderId).big_integer().null())
                    .col(
                        ColumnDef::new(Notifications::Kind)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Notifications::Title)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(text(Notifications::Content))
                    .col(ColumnDef::new(Notifications::Data).json_binary().null())
                    .col(
                        ColumnDef::new(Notifications::Read)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        timestamp_with_time_zone(Notifications::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unread-count and newest-first listing both hit these
        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_recipient_created")
                    .table(Notifications::Table)
                    .col(Notifications::RecipientId)
                    .col(Notifications::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_recipient_read")
                    .table(Notifications::Table)
                    .col(Notifications::RecipientId)
                    .col(Notifications::Read)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    RecipientId,
    SenderId,
    Kind,
    Title,
    Content,
    Data,
    Read,
    CreatedAt,
}
