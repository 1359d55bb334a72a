use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sequences::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sequences::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sequences::UserId).uuid().not_null())
                    .col(ColumnDef::new(Sequences::MailboxId).uuid().not_null())
                    .col(ColumnDef::new(Sequences::Name).string().not_null())
                    .col(
                        ColumnDef::new(Sequences::Status)
                            .string()
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(ColumnDef::new(Sequences::BusinessHours).json_binary())
                    .col(
                        ColumnDef::new(Sequences::DisableSending)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Sequences::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sequences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Sequences::Table, Sequences::MailboxId)
                            .to(Mailboxes::Table, Mailboxes::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sequences::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Sequences {
    Table,
    Id,
    UserId,
    MailboxId,
    Name,
    Status,
    BusinessHours,
    DisableSending,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Mailboxes {
    Table,
    Id,
}
