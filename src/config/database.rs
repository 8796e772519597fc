//! Database configuration module for the wallet ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema, including the unique
//! username/email constraints and the transaction foreign keys, always matches
//! the Rust structs without hand-written SQL.

use crate::entities::{Transaction, User};
use crate::errors::{Error, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;
use tracing::{debug, info};

/// Default database location used when neither the config file nor the
/// environment names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/wallet.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling
/// back to `configured` and then to [`DEFAULT_DATABASE_URL`].
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// Creates the parent directory of a file-backed `SQLite` URL.
fn ensure_database_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);
    match Path::new(file).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config {
                message: format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ),
            })
        }
        _ => Ok(()),
    }
}

/// Establishes a connection to the database at `database_url`.
///
/// In-memory `SQLite` databases live and die with their connection, so the pool
/// is pinned to a single connection for them.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_database_dir(database_url)?;

    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    debug!(database_url, "Connecting to database");
    Database::connect(options).await.map_err(Into::into)
}

/// Creates the `users` and `transactions` tables if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Users first: transactions reference them
    let mut user_table = schema.create_table_from_entity(User);
    let mut transaction_table = schema.create_table_from_entity(Transaction);
    user_table.if_not_exists();
    transaction_table.if_not_exists();

    db.execute(builder.build(&user_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;

    info!("Ledger tables ready");
    Ok(())
}
