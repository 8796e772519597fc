//! Ledger configuration loading from `wallet.toml`.
//!
//! The file is optional. When present it may name the database, set history
//! page sizes and list users to seed on first run. `DATABASE_URL` in the
//! environment (or `.env`) still wins over the file's `database_url`.

use crate::config::users::UserSeed;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "WALLET_CONFIG";
/// Config file read when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "wallet.toml";

/// Configuration structure representing the entire `wallet.toml` file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Database URL, overridden by `DATABASE_URL`
    pub database_url: Option<String>,
    /// Page size used when a caller does not ask for one
    pub default_page_size: u64,
    /// Largest page size a caller may request
    pub max_page_size: u64,
    /// Users to register on startup if missing
    pub users: Vec<UserSeed>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            default_page_size: 10,
            max_page_size: 100,
            users: Vec::new(),
        }
    }
}

impl LedgerConfig {
    fn validate(self) -> Result<Self> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(Error::Config {
                message: "Page sizes must be at least 1".to_string(),
            });
        }
        if self.default_page_size > self.max_page_size {
            return Err(Error::Config {
                message: format!(
                    "default_page_size ({}) exceeds max_page_size ({})",
                    self.default_page_size, self.max_page_size
                ),
            });
        }
        Ok(self)
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<LedgerConfig> {
    let config: LedgerConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse ledger config: {e}"),
    })?;
    config.validate()
}

/// Loads ledger configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Page sizes are zero or inconsistent
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Loads the configuration named by `WALLET_CONFIG`, or `./wallet.toml`.
///
/// A missing default file is not an error; the built-in defaults are used.
pub fn load_default_config() -> Result<LedgerConfig> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_config(path),
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH),
        Err(_) => {
            warn!("No {DEFAULT_CONFIG_PATH} found, using default configuration");
            Ok(LedgerConfig::default())
        }
    }
}
