//! Ledger store primitives - row-level reads and writes used inside an atomic unit.
//!
//! Every function here is generic over [`ConnectionTrait`], so callers pass the
//! open [`sea_orm::DatabaseTransaction`] of the operation they are running and
//! all reads and writes land in the same unit.

use crate::{
    core::money,
    entities::{Transaction, TransactionKind, User, transaction, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{DatabaseTransaction, Set, prelude::*, sea_query::Expr};
use tracing::warn;

/// Column values of a ledger row about to be appended.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Owner of the row
    pub user_id: i64,
    /// Kind of balance event
    pub kind: TransactionKind,
    /// Positive amount in minor units
    pub amount: i64,
    /// Optional description
    pub description: Option<String>,
    /// Receiving user, for transfers
    pub recipient_user_id: Option<i64>,
    /// Sending user, for `TRANSFER_IN` rows
    pub sender_user_id: Option<i64>,
    /// Caller-named prior transaction
    pub reference_transaction_id: Option<i64>,
    /// `TRANSFER_OUT` row paired with a `TRANSFER_IN`
    pub paired_transaction_id: Option<i64>,
}

impl NewEntry {
    /// Entry with only the mandatory columns set.
    #[must_use]
    pub const fn new(user_id: i64, kind: TransactionKind, amount: i64) -> Self {
        Self {
            user_id,
            kind,
            amount,
            description: None,
            recipient_user_id: None,
            sender_user_id: None,
            reference_transaction_id: None,
            paired_transaction_id: None,
        }
    }
}

/// Loads a user that exists and is active, failing with `UserNotFound` otherwise.
pub async fn load_active_user<C>(conn: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .filter(user::Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or(Error::UserNotFound { user_id })
}

/// Adds `delta` minor units to a user's balance in a single UPDATE statement.
///
/// A negative delta only applies while the stored balance still covers it, so
/// the non-negativity invariant also holds at the store level. The caller is
/// expected to have checked funds under the user's lock; a row count other
/// than one here means the row changed underneath and is a storage failure.
pub async fn adjust_balance<C>(conn: &C, user_id: i64, delta: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = User::update_many()
        .col_expr(
            user::Column::Balance,
            Expr::col(user::Column::Balance).add(delta),
        )
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user::Column::Id.eq(user_id));

    if delta < 0 {
        update = update.filter(user::Column::Balance.gte(-delta));
    }

    let result = update.exec(conn).await?;
    if result.rows_affected != 1 {
        warn!(user_id, delta, "Balance update matched no row");
        return Err(Error::StorageFailure {
            message: format!(
                "balance update for user {user_id} affected {} rows",
                result.rows_affected
            ),
        });
    }
    Ok(())
}

/// Appends one immutable ledger row.
pub async fn insert_entry<C>(conn: &C, entry: NewEntry) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    transaction::ActiveModel {
        user_id: Set(entry.user_id),
        kind: Set(entry.kind),
        amount: Set(entry.amount),
        description: Set(entry.description),
        recipient_user_id: Set(entry.recipient_user_id),
        sender_user_id: Set(entry.sender_user_id),
        reference_transaction_id: Set(entry.reference_transaction_id),
        paired_transaction_id: Set(entry.paired_transaction_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Fetches a transaction row by id.
pub async fn find_transaction<C>(conn: &C, transaction_id: i64) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Checks that `balance` covers `amount`, both in minor units.
pub fn ensure_funds(balance: i64, amount: i64) -> Result<()> {
    if balance < amount {
        return Err(Error::InsufficientFunds {
            current: money::from_minor_units(balance),
            required: money::from_minor_units(amount),
        });
    }
    Ok(())
}

/// Commits the unit on success and rolls it back on failure.
///
/// The operation's own error wins over a rollback error; the latter is only
/// logged, since the driver discards an unfinished transaction anyway.
pub async fn settle<T>(txn: DatabaseTransaction, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed operation also failed");
            }
            Err(err)
        }
    }
}
