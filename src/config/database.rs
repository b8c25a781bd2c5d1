//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{
    AccessRight, AvailabilityLock, Contract, DelegationUser, Group, GroupUser, Holiday,
    InventoryPool, Item, LendableModel, Partition, Reservation, User,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
    sea_query::TableCreateStatement,
};
use tracing::debug;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/lending.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns the
/// default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to {database_url}");

    Database::connect(&database_url).await.map_err(Into::into)
}

fn table_for<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    table
}

/// Creates all tables that do not exist yet.
///
/// Reference data (pools, models, items, users, groups) is created before the
/// reservation and contract tables that point at it.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        table_for(&schema, InventoryPool),
        table_for(&schema, Holiday),
        table_for(&schema, LendableModel),
        table_for(&schema, Item),
        table_for(&schema, User),
        table_for(&schema, AccessRight),
        table_for(&schema, DelegationUser),
        table_for(&schema, Group),
        table_for(&schema, GroupUser),
        table_for(&schema, Partition),
        table_for(&schema, Contract),
        table_for(&schema, Reservation),
        table_for(&schema, AvailabilityLock),
    ];

    for table in &tables {
        db.execute(builder.build(table)).await?;
    }

    Ok(())
}
