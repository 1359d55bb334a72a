use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SequenceSteps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SequenceSteps::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SequenceSteps::SequenceId).uuid().not_null())
                    .col(ColumnDef::new(SequenceSteps::StepOrder).integer().not_null())
                    .col(
                        ColumnDef::new(SequenceSteps::DelayAmount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SequenceSteps::DelayUnit)
                            .string()
                            .not_null()
                            .default("days"),
                    )
                    .col(ColumnDef::new(SequenceSteps::Subject).string().not_null())
                    .col(ColumnDef::new(SequenceSteps::Content).text().not_null())
                    .col(ColumnDef::new(SequenceSteps::TemplateId).uuid())
                    .col(
                        ColumnDef::new(SequenceSteps::ReplyToThread)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SequenceSteps::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(SequenceSteps::Table, SequenceSteps::SequenceId)
                            .to(Sequences::Table, Sequences::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(SequenceSteps::Table)
                    .col(SequenceSteps::SequenceId)
                    .col(SequenceSteps::StepOrder)
                    .unique()
                    .name("uq_sequence_steps_sequence_order")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SequenceSteps::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SequenceSteps {
    Table,
    Id,
    SequenceId,
    StepOrder,
    DelayAmount,
    DelayUnit,
    Subject,
    Content,
    TemplateId,
    ReplyToThread,
    CreatedAt,
}

#[derive(Iden)]
enum Sequences {
    Table,
    Id,
}
