use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SequenceContacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SequenceContacts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SequenceContacts::SequenceId).uuid().not_null())
                    .col(ColumnDef::new(SequenceContacts::ContactId).uuid().not_null())
                    .col(
                        ColumnDef::new(SequenceContacts::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(SequenceContacts::CurrentStep)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(SequenceContacts::ThreadId).string())
                    .col(ColumnDef::new(SequenceContacts::StartedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(SequenceContacts::LastProcessedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(SequenceContacts::NextScheduledAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(SequenceContacts::Completed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SequenceContacts::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(SequenceContacts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SequenceContacts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(SequenceContacts::Table, SequenceContacts::SequenceId)
                            .to(Sequences::Table, Sequences::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(SequenceContacts::Table, SequenceContacts::ContactId)
                            .to(Contacts::Table, Contacts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(SequenceContacts::Table)
                    .col(SequenceContacts::SequenceId)
                    .col(SequenceContacts::ContactId)
                    .unique()
                    .name("uq_sequence_contacts_sequence_contact")
                    .to_owned(),
            )
            .await?;

        // Sweep query: due contacts of one sequence.
        manager
            .create_index(
                Index::create()
                    .table(SequenceContacts::Table)
                    .col(SequenceContacts::SequenceId)
                    .col(SequenceContacts::NextScheduledAt)
                    .name("idx_sequence_contacts_next_scheduled_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SequenceContacts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SequenceContacts {
    Table,
    Id,
    SequenceId,
    ContactId,
    Status,
    CurrentStep,
    ThreadId,
    StartedAt,
    LastProcessedAt,
    NextScheduledAt,
    Completed,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Sequences {
    Table,
    Id,
}

#[derive(Iden)]
enum Contacts {
    Table,
    Id,
}
