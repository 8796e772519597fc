//! Transaction entity - One immutable entry of the audit trail.
//!
//! Each row has an owner (`user_id`), a `kind`, a positive `amount` in minor
//! units whose sign is implied by the kind, and optional counterparty and link
//! columns. Rows are inserted together with their balance effect and are never
//! updated or deleted.
//!
//! Two self-referential links exist:
//! - `reference_transaction_id` points at a prior transaction the caller named
//!   (a transfer made against an invoice payment, a refund of a debit, ...).
//! - `paired_transaction_id` is set on every `TRANSFER_IN` row and points at the
//!   `TRANSFER_OUT` row written just before it in the same atomic unit.
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::money;

/// Closed set of transaction kinds, stored as their upper-case names.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// External funds added to the wallet
    #[sea_orm(string_value = "CREDIT")]
    Credit,
    /// External funds removed from the wallet
    #[sea_orm(string_value = "DEBIT")]
    Debit,
    /// Incoming half of a transfer
    #[sea_orm(string_value = "TRANSFER_IN")]
    TransferIn,
    /// Outgoing half of a transfer
    #[sea_orm(string_value = "TRANSFER_OUT")]
    TransferOut,
    /// Funds returned against an earlier outflow
    #[sea_orm(string_value = "REFUND")]
    Refund,
    /// Payment to a merchant
    #[sea_orm(string_value = "PAYMENT")]
    Payment,
    /// Cash-out to an external account
    #[sea_orm(string_value = "WITHDRAWAL")]
    Withdrawal,
    /// Funds deposited at registration
    #[sea_orm(string_value = "DEPOSIT")]
    Deposit,
    /// Service fee
    #[sea_orm(string_value = "FEE")]
    Fee,
    /// Manual correction
    #[sea_orm(string_value = "ADJUSTMENT")]
    Adjustment,
    /// Reversal of an earlier entry
    #[sea_orm(string_value = "REVERSAL")]
    Reversal,
    /// Card-network chargeback
    #[sea_orm(string_value = "CHARGEBACK")]
    Chargeback,
}

impl TransactionKind {
    /// Kinds that take money out of the owner's wallet.
    #[must_use]
    pub const fn is_outflow(self) -> bool {
        matches!(
            self,
            Self::Debit | Self::TransferOut | Self::Payment | Self::Withdrawal | Self::Fee
        )
    }

    /// Outflows to outside the ledger, which a refund may return.
    ///
    /// `TRANSFER_OUT` is excluded: its funds sit in another wallet, and
    /// crediting them back without debiting the recipient would create money.
    #[must_use]
    pub const fn is_refundable(self) -> bool {
        self.is_outflow() && !matches!(self, Self::TransferOut)
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique, monotonically assigned identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who owns this entry
    pub user_id: i64,
    /// What kind of balance event this is
    pub kind: TransactionKind,
    /// Positive amount in minor units
    pub amount: i64,
    /// Optional human-readable description
    pub description: Option<String>,
    /// Receiving user for transfers
    pub recipient_user_id: Option<i64>,
    /// Sending user, recorded on `TRANSFER_IN` rows
    pub sender_user_id: Option<i64>,
    /// Prior transaction named by the caller
    pub reference_transaction_id: Option<i64>,
    /// `TRANSFER_OUT` row this `TRANSFER_IN` row pairs with
    pub paired_transaction_id: Option<i64>,
    /// When the entry was written
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Amount as a decimal.
    #[must_use]
    pub fn amount_decimal(&self) -> Decimal {
        money::from_minor_units(self.amount)
    }
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction is owned by one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        fk_name = "fk-transactions-owner"
    )]
    Owner,
    /// Optional link to the caller-named prior transaction
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ReferenceTransactionId",
        to = "Column::Id",
        fk_name = "fk-transactions-reference"
    )]
    Reference,
    /// Optional link from a `TRANSFER_IN` to its `TRANSFER_OUT`
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::PairedTransactionId",
        to = "Column::Id",
        fk_name = "fk-transactions-paired"
    )]
    Paired,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
