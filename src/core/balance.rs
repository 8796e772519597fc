//! Balance operations - credit, debit, transfer and refund.
//!
//! Each operation runs as one atomic unit: the per-user locks are taken first,
//! then a database transaction is opened, the rows are read and validated, the
//! balances and ledger rows are written, and the unit is committed. Any error
//! before the commit rolls the whole unit back, so a failed operation leaves
//! no trace in the store.

use crate::{
    core::{
        guard::UserLocks,
        history::{self, Page},
        money, reference,
        store::{self, NewEntry},
    },
    entities::{TransactionKind, transaction},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::{info, instrument, warn};

/// Both rows written by a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// `TRANSFER_OUT` row owned by the sender
    pub outgoing: transaction::Model,
    /// `TRANSFER_IN` row owned by the recipient
    pub incoming: transaction::Model,
}

/// Ledger engine handle.
///
/// Holds the injected database connection and the lock table. Cloning is cheap
/// and every clone shares the same locks, so one `Ledger` should be created per
/// store and handed to all callers.
#[derive(Clone, Debug)]
pub struct Ledger {
    db: DatabaseConnection,
    locks: UserLocks,
    default_page_size: u64,
    max_page_size: u64,
}

impl Ledger {
    /// Page size used by [`Ledger::first_page`] unless configured.
    pub const DEFAULT_PAGE_SIZE: u64 = 10;
    /// Default upper bound for history page sizes.
    pub const DEFAULT_MAX_PAGE_SIZE: u64 = 100;

    /// Creates a ledger over `db` using `locks` for per-user exclusivity.
    #[must_use]
    pub fn new(db: DatabaseConnection, locks: UserLocks) -> Self {
        Self {
            db,
            locks,
            default_page_size: Self::DEFAULT_PAGE_SIZE,
            max_page_size: Self::DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Sets the default page size and caps the page size accepted by the
    /// history queries.
    #[must_use]
    pub fn with_page_sizes(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size;
        self.default_page_size = default_page_size.min(max_page_size);
        self
    }

    /// The underlying connection, for read-only queries.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Adds `amount` to a user's balance and records a `CREDIT` row.
    #[instrument(skip(self, description))]
    pub async fn credit(
        &self,
        user_id: i64,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<transaction::Model> {
        let minor = money::to_minor_units(amount)?;

        let _guard = self.locks.acquire(&[user_id]).await;
        let txn = self.db.begin().await?;
        let outcome = apply_credit(&txn, user_id, minor, description).await;
        let entry = store::settle(txn, outcome)
            .await
            .inspect_err(|e| warn!(user_id, %amount, error = %e, "Credit rejected"))?;

        info!(user_id, %amount, transaction_id = entry.id, "Credit committed");
        Ok(entry)
    }

    /// Removes `amount` from a user's balance and records a `DEBIT` row.
    #[instrument(skip(self, description))]
    pub async fn debit(
        &self,
        user_id: i64,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<transaction::Model> {
        let minor = money::to_minor_units(amount)?;

        let _guard = self.locks.acquire(&[user_id]).await;
        let txn = self.db.begin().await?;
        let outcome = apply_debit(&txn, user_id, minor, description).await;
        let entry = store::settle(txn, outcome)
            .await
            .inspect_err(|e| warn!(user_id, %amount, error = %e, "Debit rejected"))?;

        info!(user_id, %amount, transaction_id = entry.id, "Debit committed");
        Ok(entry)
    }

    /// Moves `amount` from `sender_id` to `recipient_id`.
    ///
    /// Writes a `TRANSFER_OUT` row for the sender and a `TRANSFER_IN` row for
    /// the recipient; the latter points at the former through
    /// `paired_transaction_id`. A supplied `reference_id` must name an existing
    /// transaction and is stamped on both rows.
    #[instrument(skip(self, description))]
    pub async fn transfer(
        &self,
        sender_id: i64,
        recipient_id: i64,
        amount: Decimal,
        description: Option<String>,
        reference_id: Option<i64>,
    ) -> Result<TransferReceipt> {
        let minor = money::to_minor_units(amount)?;
        if sender_id == recipient_id {
            warn!(sender_id, "Self transfer rejected");
            return Err(Error::SelfTransferNotAllowed { user_id: sender_id });
        }

        let _guard = self.locks.acquire(&[sender_id, recipient_id]).await;
        let txn = self.db.begin().await?;
        let outcome = apply_transfer(
            &txn,
            TransferRequest {
                sender_id,
                recipient_id,
                amount: minor,
                description,
                reference_id,
            },
        )
        .await;
        let receipt = store::settle(txn, outcome).await.inspect_err(|e| {
            warn!(sender_id, recipient_id, %amount, error = %e, "Transfer rejected");
        })?;

        info!(
            sender_id,
            recipient_id,
            %amount,
            outgoing_id = receipt.outgoing.id,
            incoming_id = receipt.incoming.id,
            "Transfer committed"
        );
        Ok(receipt)
    }

    /// Returns `amount` to a user against an earlier outflow of theirs,
    /// recorded as a `REFUND` row referencing it.
    #[instrument(skip(self, description))]
    pub async fn refund(
        &self,
        user_id: i64,
        amount: Decimal,
        reference_id: i64,
        description: Option<String>,
    ) -> Result<transaction::Model> {
        let minor = money::to_minor_units(amount)?;

        let _guard = self.locks.acquire(&[user_id]).await;
        let txn = self.db.begin().await?;
        let outcome = apply_refund(&txn, user_id, minor, reference_id, description).await;
        let entry = store::settle(txn, outcome)
            .await
            .inspect_err(|e| warn!(user_id, reference_id, error = %e, "Refund rejected"))?;

        info!(user_id, %amount, reference_id, transaction_id = entry.id, "Refund committed");
        Ok(entry)
    }

    /// Current balance of an active user.
    pub async fn balance(&self, user_id: i64) -> Result<Decimal> {
        let user = store::load_active_user(&self.db, user_id).await?;
        Ok(user.balance_decimal())
    }

    /// Page of a user's history, oldest first.
    pub async fn history(
        &self,
        user_id: i64,
        page: u64,
        page_size: u64,
    ) -> Result<Vec<transaction::Model>> {
        let page = Page::new(page, page_size)?.capped(self.max_page_size);
        history::list_by_user(&self.db, user_id, page).await
    }

    /// Oldest page of a user's history at the default page size.
    pub async fn first_page(&self, user_id: i64) -> Result<Vec<transaction::Model>> {
        self.history(user_id, 1, self.default_page_size).await
    }

    /// Page of a user's history restricted to one kind, oldest first.
    pub async fn history_by_kind(
        &self,
        user_id: i64,
        kind: TransactionKind,
        page: u64,
        page_size: u64,
    ) -> Result<Vec<transaction::Model>> {
        let page = Page::new(page, page_size)?.capped(self.max_page_size);
        history::list_by_user_and_kind(&self.db, user_id, kind, page).await
    }

    /// Single transaction by id.
    pub async fn transaction(&self, transaction_id: i64) -> Result<Option<transaction::Model>> {
        history::get_by_id(&self.db, transaction_id).await
    }

    /// Rows linking back to `transaction_id`.
    pub async fn linked(&self, transaction_id: i64) -> Result<Vec<transaction::Model>> {
        reference::find_linked(&self.db, transaction_id).await
    }
}

/// Validated input of a transfer, amount in minor units.
#[derive(Debug, Clone)]
struct TransferRequest {
    /// Paying user
    sender_id: i64,
    /// Receiving user
    recipient_id: i64,
    /// Positive amount in minor units
    amount: i64,
    /// Shared description, defaulted per side when absent
    description: Option<String>,
    /// Optional prior transaction to link both rows to
    reference_id: Option<i64>,
}

/// Credit body, run inside an open unit.
async fn apply_credit<C>(
    conn: &C,
    user_id: i64,
    amount: i64,
    description: Option<String>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let user = store::load_active_user(conn, user_id).await?;
    if user.balance.checked_add(amount).is_none() {
        return Err(Error::InvalidAmount {
            amount: money::from_minor_units(amount),
        });
    }

    store::adjust_balance(conn, user_id, amount).await?;

    let mut entry = NewEntry::new(user_id, TransactionKind::Credit, amount);
    entry.description = description;
    store::insert_entry(conn, entry).await
}

/// Debit body, run inside an open unit.
async fn apply_debit<C>(
    conn: &C,
    user_id: i64,
    amount: i64,
    description: Option<String>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let user = store::load_active_user(conn, user_id).await?;
    store::ensure_funds(user.balance, amount)?;

    store::adjust_balance(conn, user_id, -amount).await?;

    let mut entry = NewEntry::new(user_id, TransactionKind::Debit, amount);
    entry.description = description;
    store::insert_entry(conn, entry).await
}

/// Transfer body, run inside an open unit.
///
/// All checks complete before the first write.
async fn apply_transfer<C>(conn: &C, request: TransferRequest) -> Result<TransferReceipt>
where
    C: ConnectionTrait,
{
    let TransferRequest {
        sender_id,
        recipient_id,
        amount,
        description,
        reference_id,
    } = request;

    let sender = store::load_active_user(conn, sender_id).await?;
    let recipient = store::load_active_user(conn, recipient_id).await?;
    store::ensure_funds(sender.balance, amount)?;
    if recipient.balance.checked_add(amount).is_none() {
        return Err(Error::InvalidAmount {
            amount: money::from_minor_units(amount),
        });
    }
    let reference_id = reference::resolve_reference(conn, reference_id)
        .await?
        .map(|referenced| referenced.id);

    store::adjust_balance(conn, sender_id, -amount).await?;
    store::adjust_balance(conn, recipient_id, amount).await?;

    let outgoing = store::insert_entry(
        conn,
        NewEntry {
            description: Some(
                description
                    .clone()
                    .unwrap_or_else(|| format!("Transfer to user {recipient_id}")),
            ),
            recipient_user_id: Some(recipient_id),
            reference_transaction_id: reference_id,
            ..NewEntry::new(sender_id, TransactionKind::TransferOut, amount)
        },
    )
    .await?;

    let incoming = store::insert_entry(
        conn,
        NewEntry {
            description: Some(
                description.unwrap_or_else(|| format!("Transfer from user {sender_id}")),
            ),
            recipient_user_id: Some(recipient_id),
            sender_user_id: Some(sender_id),
            reference_transaction_id: reference_id,
            paired_transaction_id: reference::pair_with(&outgoing),
            ..NewEntry::new(recipient_id, TransactionKind::TransferIn, amount)
        },
    )
    .await?;

    Ok(TransferReceipt { outgoing, incoming })
}

/// Refund body, run inside an open unit.
async fn apply_refund<C>(
    conn: &C,
    user_id: i64,
    amount: i64,
    reference_id: i64,
    description: Option<String>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let user = store::load_active_user(conn, user_id).await?;
    let referenced = store::find_transaction(conn, reference_id)
        .await?
        .ok_or(Error::ReferenceNotFound {
            transaction_id: reference_id,
        })?;
    reference::ensure_refundable(conn, &referenced, user_id, amount).await?;
    if user.balance.checked_add(amount).is_none() {
        return Err(Error::InvalidAmount {
            amount: money::from_minor_units(amount),
        });
    }

    store::adjust_balance(conn, user_id, amount).await?;

    let entry = NewEntry {
        description: Some(
            description.unwrap_or_else(|| format!("Refund of transaction {reference_id}")),
        ),
        reference_transaction_id: Some(referenced.id),
        ..NewEntry::new(user_id, TransactionKind::Refund, amount)
    };
    store::insert_entry(conn, entry).await
}
