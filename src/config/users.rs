//! Users seeded from configuration on startup.
//!
//! Each `[[users]]` entry of `wallet.toml` is registered unless a user with the
//! same username already exists, so seeding is safe to repeat on every start.

use crate::{
    core::user::{self, NewUser},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tracing::{debug, info};

/// Configuration for a single seeded user
#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
    /// Unique login name
    pub username: String,
    /// Unique contact email
    pub email: String,
    /// Optional display name
    #[serde(default)]
    pub full_name: Option<String>,
    /// Optional contact phone
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Opening balance as a quoted decimal string, e.g. `"100.50"`
    #[serde(default, with = "rust_decimal::serde::str")]
    pub initial_balance: Decimal,
}

impl From<UserSeed> for NewUser {
    fn from(seed: UserSeed) -> Self {
        Self {
            username: seed.username,
            email: seed.email,
            full_name: seed.full_name,
            phone_number: seed.phone_number,
            initial_balance: seed.initial_balance,
        }
    }
}

/// Registers every seed whose username is not taken yet.
///
/// Returns how many users were created.
pub async fn seed_users(db: &DatabaseConnection, seeds: &[UserSeed]) -> Result<usize> {
    info!(
        "Starting to seed users. Found {} configurations from TOML.",
        seeds.len()
    );

    let mut created = 0;
    for seed in seeds {
        if user::get_user_by_username(db, &seed.username).await?.is_some() {
            debug!(username = %seed.username, "User already exists, skipping seed");
            continue;
        }
        user::register_user(db, seed.clone().into()).await?;
        created += 1;
    }

    info!(created, "User seeding finished");
    Ok(created)
}
