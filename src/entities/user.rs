//! User entity - A wallet holder and their denormalized balance.
//!
//! The `balance` column is kept in minor units (cents) and is only ever changed
//! by the ledger operations in [`crate::core::balance`], together with the
//! transaction row that explains the change.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::money;

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login name, unique across all users
    #[sea_orm(unique)]
    pub username: String,
    /// Contact email, unique across all users
    #[sea_orm(unique)]
    pub email: String,
    /// Optional display name
    pub full_name: Option<String>,
    /// Optional contact phone
    pub phone_number: Option<String>,
    /// Current balance in minor units, never negative after a commit
    pub balance: i64,
    /// Soft deactivation flag - inactive users cannot transact
    pub is_active: bool,
    /// When the user registered
    pub created_at: DateTimeUtc,
    /// When the profile or balance last changed
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Balance as a decimal amount.
    #[must_use]
    pub fn balance_decimal(&self) -> Decimal {
        money::from_minor_units(self.balance)
    }
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user owns many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
