use sea_orm_migration::prelude::*;

mod m20261001_000001_create_contacts;
mod m20261001_000002_create_mailboxes;
mod m20261001_000003_create_sequences;
mod m20261001_000004_create_sequence_steps;
mod m20261001_000005_create_sequence_contacts;
mod m20261001_000006_create_email_trackings;
mod m20261001_000007_create_email_events;
mod m20261001_000008_create_email_threads;
mod m20261001_000009_create_sequence_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_contacts::Migration),
            Box::new(m20261001_000002_create_mailboxes::Migration),
            Box::new(m20261001_000003_create_sequences::Migration),
            Box::new(m20261001_000004_create_sequence_steps::Migration),
            Box::new(m20261001_000005_create_sequence_contacts::Migration),
            Box::new(m20261001_000006_create_email_trackings::Migration),
            Box::new(m20261001_000007_create_email_events::Migration),
            Box::new(m20261001_000008_create_email_threads::Migration),
            Box::new(m20261001_000009_create_sequence_jobs::Migration),
        ]
    }
}
