// src/db/mod.rs

//! Store operations, one module per document collection.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::SqliteConnectOptions;

pub mod comments;
pub mod pending_blobs;
pub mod posts;
pub mod users;

/// Connection options for a `sqlite:` URL. Creates the file when missing and
/// enforces foreign keys, which the post cascades rely on.
pub fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true))
}

/// Applies the embedded migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
