//! Unified error type for the wallet ledger.
//!
//! Every failure path of the engine maps to one variant here. Validation
//! variants are raised before any write is attempted; only
//! [`Error::StorageFailure`] can originate inside an atomic unit, and in that
//! case the unit has been rolled back.

use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum Error {
    /// No active user resolves to the given id
    #[error("User {user_id} not found")]
    UserNotFound {
        /// The id that failed to resolve
        user_id: i64,
    },

    /// Amount is non-positive, has sub-cent precision, or overflows
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Balance does not cover the requested amount
    #[error("Insufficient funds: balance {current}, required {required}")]
    InsufficientFunds {
        /// Balance at the time of the check
        current: Decimal,
        /// Amount the operation needed
        required: Decimal,
    },

    /// Sender and recipient of a transfer are the same user
    #[error("User {user_id} cannot transfer to themselves")]
    SelfTransferNotAllowed {
        /// The user on both sides of the transfer
        user_id: i64,
    },

    /// A referenced prior transaction does not exist
    #[error("Reference transaction {transaction_id} not found")]
    ReferenceNotFound {
        /// The missing transaction id
        transaction_id: i64,
    },

    /// A referenced transaction exists but cannot be linked for this operation
    #[error("Transaction {transaction_id} cannot be referenced: {reason}")]
    InvalidReference {
        /// The referenced transaction id
        transaction_id: i64,
        /// Why the link was refused
        reason: String,
    },

    /// Registration or profile update collides with an existing user
    #[error("Username '{username}' or email '{email}' is already registered")]
    DuplicateUsernameOrEmail {
        /// Requested username
        username: String,
        /// Requested email
        email: String,
    },

    /// Malformed non-monetary input (empty username, bad email, ...)
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the problem
        message: String,
    },

    /// Page number or page size of zero
    #[error("Invalid page {page} with page size {page_size}")]
    InvalidPage {
        /// Requested page (1-based)
        page: u64,
        /// Requested page size
        page_size: u64,
    },

    /// Underlying store failed; no partial state was persisted
    #[error("Storage failure: {message}")]
    StorageFailure {
        /// Driver error text
        message: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },
}

impl Error {
    /// Whether the caller may safely retry the same operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure { .. })
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        Self::StorageFailure {
            message: err.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
