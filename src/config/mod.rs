/// Database configuration and connection management
pub mod database;

/// Ledger configuration loading from wallet.toml
pub mod settings;

/// Users seeded from configuration
pub mod users;
