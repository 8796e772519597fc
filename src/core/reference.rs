//! Reference linking between ledger rows.
//!
//! A new row may only point at a row that is already committed (or inserted
//! earlier in the same unit), so every link goes from a larger id to a smaller
//! one and the link graph can never form a cycle.

use crate::{
    core::store,
    entities::{Transaction, TransactionKind, transaction},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, prelude::*};

/// Validates an optional caller-supplied reference and returns the referenced row.
pub async fn resolve_reference<C>(
    conn: &C,
    reference_id: Option<i64>,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    let Some(transaction_id) = reference_id else {
        return Ok(None);
    };

    store::find_transaction(conn, transaction_id)
        .await?
        .map(Some)
        .ok_or(Error::ReferenceNotFound { transaction_id })
}

/// Back-pointer a `TRANSFER_IN` row stores to its `TRANSFER_OUT` half.
#[must_use]
pub const fn pair_with(outgoing: &transaction::Model) -> Option<i64> {
    Some(outgoing.id)
}

/// Checks that `amount` minor units may be refunded against `referenced`.
///
/// The referenced row must belong to the refunded user and must have paid
/// money out of the ledger (transfers are excluded). Together with earlier
/// refunds against it the total may not exceed the original amount.
pub async fn ensure_refundable<C>(
    conn: &C,
    referenced: &transaction::Model,
    user_id: i64,
    amount: i64,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if referenced.user_id != user_id {
        return Err(Error::InvalidReference {
            transaction_id: referenced.id,
            reason: format!("owned by user {}, not {user_id}", referenced.user_id),
        });
    }

    if !referenced.kind.is_refundable() {
        return Err(Error::InvalidReference {
            transaction_id: referenced.id,
            reason: format!("{:?} entries cannot be refunded", referenced.kind),
        });
    }

    let already_refunded: i64 = Transaction::find()
        .filter(transaction::Column::ReferenceTransactionId.eq(referenced.id))
        .filter(transaction::Column::Kind.eq(TransactionKind::Refund))
        .all(conn)
        .await?
        .iter()
        .map(|row| row.amount)
        .sum();

    if already_refunded
        .checked_add(amount)
        .is_none_or(|total| total > referenced.amount)
    {
        return Err(Error::InvalidReference {
            transaction_id: referenced.id,
            reason: format!(
                "refund would exceed original amount ({already_refunded} of {} minor units already refunded)",
                referenced.amount
            ),
        });
    }
    Ok(())
}

/// Rows that point back at `transaction_id`, either as a caller reference or
/// as the incoming half of a transfer, oldest first.
pub async fn find_linked<C>(conn: &C, transaction_id: i64) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(
            Condition::any()
                .add(transaction::Column::ReferenceTransactionId.eq(transaction_id))
                .add(transaction::Column::PairedTransactionId.eq(transaction_id)),
        )
        .order_by_asc(transaction::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}
