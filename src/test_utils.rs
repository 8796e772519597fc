//! Shared test utilities for the wallet ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test users with sensible defaults.

use crate::{
    config::database,
    core::{
        Ledger, UserLocks,
        user::{self, NewUser},
    },
    entities,
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = database::create_connection("sqlite::memory:").await?;
    database::create_tables(&db).await?;
    Ok(db)
}

/// Registers a user with a zero balance.
///
/// # Defaults
/// * `email`: `"<username>@example.com"`
/// * `full_name`, `phone_number`: None
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
) -> Result<entities::user::Model> {
    create_funded_user(db, username, Decimal::ZERO).await
}

/// Registers a user with an opening balance (recorded as a `DEPOSIT` row).
pub async fn create_funded_user(
    db: &DatabaseConnection,
    username: &str,
    initial_balance: Decimal,
) -> Result<entities::user::Model> {
    user::register_user(
        db,
        NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            initial_balance,
            ..Default::default()
        },
    )
    .await
}

/// Sets up a ledger with two users.
/// Returns (ledger, alice with 100.00, bob with 50.00).
pub async fn setup_ledger_with_users()
-> Result<(Ledger, entities::user::Model, entities::user::Model)> {
    let db = setup_test_db().await?;
    let alice = create_funded_user(&db, "alice", Decimal::from(100)).await?;
    let bob = create_funded_user(&db, "bob", Decimal::from(50)).await?;
    Ok((Ledger::new(db, UserLocks::new()), alice, bob))
}
