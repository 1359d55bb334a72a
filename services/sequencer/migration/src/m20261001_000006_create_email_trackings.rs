use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailTrackings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailTrackings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailTrackings::Hash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(EmailTrackings::UserId).uuid().not_null())
                    .col(ColumnDef::new(EmailTrackings::SequenceId).uuid())
                    .col(ColumnDef::new(EmailTrackings::StepId).uuid())
                    .col(ColumnDef::new(EmailTrackings::ContactId).uuid())
                    .col(ColumnDef::new(EmailTrackings::Email).string().not_null())
                    .col(
                        ColumnDef::new(EmailTrackings::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(EmailTrackings::MessageId).string())
                    .col(ColumnDef::new(EmailTrackings::RfcMessageId).string())
                    .col(ColumnDef::new(EmailTrackings::ThreadId).string())
                    .col(ColumnDef::new(EmailTrackings::Metadata).json_binary().not_null())
                    .col(ColumnDef::new(EmailTrackings::SentAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(EmailTrackings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailTrackings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(EmailTrackings::Table)
                    .col(EmailTrackings::SequenceId)
                    .col(EmailTrackings::ContactId)
                    .name("idx_email_trackings_sequence_contact")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailTrackings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EmailTrackings {
    Table,
    Id,
    Hash,
    UserId,
    SequenceId,
    StepId,
    ContactId,
    Email,
    Status,
    MessageId,
    RfcMessageId,
    ThreadId,
    Metadata,
    SentAt,
    CreatedAt,
    UpdatedAt,
}
