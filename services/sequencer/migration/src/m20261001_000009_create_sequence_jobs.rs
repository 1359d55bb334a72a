use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SequenceJobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SequenceJobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SequenceJobs::Kind).string().not_null())
                    .col(ColumnDef::new(SequenceJobs::Payload).json_binary().not_null())
                    .col(ColumnDef::new(SequenceJobs::DedupKey).string().not_null())
                    .col(
                        ColumnDef::new(SequenceJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SequenceJobs::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(5),
                    )
                    .col(ColumnDef::new(SequenceJobs::LastError).string())
                    .col(
                        ColumnDef::new(SequenceJobs::RunAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SequenceJobs::LockedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(SequenceJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SequenceJobs::ProcessedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SequenceJobs::FailedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index for worker claim queries (by kind, by run_at).
        manager
            .create_index(
                Index::create()
                    .table(SequenceJobs::Table)
                    .col(SequenceJobs::Kind)
                    .col(SequenceJobs::RunAt)
                    .name("idx_sequence_jobs_kind_run_at")
                    .to_owned(),
            )
            .await?;

        // Single active job per dedup key; finished rows do not block re-enqueue.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_sequence_jobs_active_dedup_key \
                 ON sequence_jobs (dedup_key) \
                 WHERE processed_at IS NULL AND failed_at IS NULL",
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SequenceJobs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SequenceJobs {
    Table,
    Id,
    Kind,
    Payload,
    DedupKey,
    Attempts,
    MaxAttempts,
    LastError,
    RunAt,
    LockedAt,
    CreatedAt,
    ProcessedAt,
    FailedAt,
}
