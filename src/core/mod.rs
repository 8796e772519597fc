//! Ledger engine - framework-agnostic balance operations, history queries and
//! the primitives they are built from.

/// Credit, debit, transfer and refund on the [`balance::Ledger`] handle
pub mod balance;
/// Per-user locks serializing balance-affecting operations
pub mod guard;
/// Paginated transaction history
pub mod history;
/// Decimal amounts and stored minor units
pub mod money;
/// Validation and lookup of links between transactions
pub mod reference;
/// Row-level reads and writes used inside an atomic unit
pub mod store;
/// Registration, profile updates and user lookups
pub mod user;

pub use balance::{Ledger, TransferReceipt};
pub use guard::UserLocks;
pub use history::Page;
