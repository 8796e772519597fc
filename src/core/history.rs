//! Transaction history queries.
//!
//! Pages are 1-based and ordered by transaction id, which is assigned in
//! insertion order, so page `n` of size `s` always holds the `(n-1)*s+1`-th to
//! `n*s`-th oldest rows of the user.

use crate::{
    entities::{Transaction, TransactionKind, transaction},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Select, prelude::*};

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u64,
    size: u64,
}

impl Page {
    /// Validates a page request; both values must be at least 1.
    pub fn new(number: u64, size: u64) -> Result<Self> {
        if number == 0 || size == 0 {
            return Err(Error::InvalidPage {
                page: number,
                page_size: size,
            });
        }
        Ok(Self { number, size })
    }

    /// Limits the page size to `max`.
    #[must_use]
    pub const fn capped(self, max: u64) -> Self {
        let size = if self.size > max { max } else { self.size };
        Self {
            number: self.number,
            size,
        }
    }

    /// Rows to skip before this page.
    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.number - 1).saturating_mul(self.size)
    }

    /// Maximum rows on this page.
    #[must_use]
    pub const fn size(self) -> u64 {
        self.size
    }
}

fn paginate(query: Select<Transaction>, page: Page) -> Select<Transaction> {
    query
        .order_by_asc(transaction::Column::Id)
        .offset(page.offset())
        .limit(page.size())
}

/// Rows owned by `user_id`, oldest first. Pages past the end are empty.
pub async fn list_by_user<C>(
    conn: &C,
    user_id: i64,
    page: Page,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    let query = Transaction::find().filter(transaction::Column::UserId.eq(user_id));
    paginate(query, page).all(conn).await.map_err(Into::into)
}

/// Rows owned by `user_id` with the given kind, oldest first.
pub async fn list_by_user_and_kind<C>(
    conn: &C,
    user_id: i64,
    kind: TransactionKind,
    page: Page,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    let query = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Kind.eq(kind));
    paginate(query, page).all(conn).await.map_err(Into::into)
}

/// Single transaction by id.
pub async fn get_by_id<C>(conn: &C, transaction_id: i64) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    crate::core::store::find_transaction(conn, transaction_id).await
}
