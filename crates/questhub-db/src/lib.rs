//! Persistence layer for the QuestHub workspace platform
//!
//! SeaORM entities for tenants, memberships, invite codes, points
//! balances, reward issuances and the provider webhook log, plus
//! connection and migration helpers.

pub mod entities;
pub mod migrator;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

pub use migrator::Migrator;

/// Connect to the database at the given URL (postgres or sqlite)
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_string());
    options
        .max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    tracing::debug!("Connecting to database");
    Database::connect(options).await
}

/// Run all pending migrations
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    tracing::info!("Running database migrations");
    Migrator::up(db, None).await
}
