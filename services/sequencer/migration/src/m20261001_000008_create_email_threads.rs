use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailThreads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EmailThreads::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(EmailThreads::SequenceId).uuid().not_null())
                    .col(ColumnDef::new(EmailThreads::ContactId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmailThreads::ProviderThreadId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailThreads::FirstMessageId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailThreads::Subject).string().not_null())
                    .col(
                        ColumnDef::new(EmailThreads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(EmailThreads::Table)
                    .col(EmailThreads::SequenceId)
                    .col(EmailThreads::ContactId)
                    .unique()
                    .name("uq_email_threads_sequence_contact")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailThreads::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EmailThreads {
    Table,
    Id,
    SequenceId,
    ContactId,
    ProviderThreadId,
    FirstMessageId,
    Subject,
    CreatedAt,
}
