use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailEvents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EmailEvents::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(EmailEvents::Kind).string().not_null())
                    .col(ColumnDef::new(EmailEvents::SequenceId).uuid().not_null())
                    .col(ColumnDef::new(EmailEvents::ContactId).uuid().not_null())
                    .col(ColumnDef::new(EmailEvents::TrackingId).uuid())
                    .col(ColumnDef::new(EmailEvents::Metadata).json_binary().not_null())
                    .col(
                        ColumnDef::new(EmailEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Terminal-event gate lookups.
        manager
            .create_index(
                Index::create()
                    .table(EmailEvents::Table)
                    .col(EmailEvents::SequenceId)
                    .col(EmailEvents::ContactId)
                    .col(EmailEvents::Kind)
                    .name("idx_email_events_sequence_contact_kind")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EmailEvents {
    Table,
    Id,
    Kind,
    SequenceId,
    ContactId,
    TrackingId,
    Metadata,
    OccurredAt,
}
