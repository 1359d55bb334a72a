use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Mailboxes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Mailboxes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Mailboxes::UserId).uuid().not_null())
                    .col(ColumnDef::new(Mailboxes::Email).string().not_null())
                    .col(ColumnDef::new(Mailboxes::DisplayName).string())
                    .col(ColumnDef::new(Mailboxes::AccessToken).text().not_null())
                    .col(ColumnDef::new(Mailboxes::TokenExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Mailboxes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Mailboxes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Mailboxes {
    Table,
    Id,
    UserId,
    Email,
    DisplayName,
    AccessToken,
    TokenExpiresAt,
    CreatedAt,
}
