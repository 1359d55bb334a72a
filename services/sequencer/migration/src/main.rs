use sea_orm_migration::prelude::*;

use cadence_sequencer_migration::Migrator;

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
