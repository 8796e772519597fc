//! User registry - registration, profile updates, lookups and deactivation.
//!
//! Balances are never written here except for the opening balance at
//! registration, which is recorded as a `DEPOSIT` row in the same unit so the
//! ledger always explains the stored balance.

use crate::{
    core::{
        money,
        store::{self, NewEntry},
    },
    entities::{TransactionKind, User, user},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Condition, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use tracing::{info, warn};

/// Registration input.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Unique login name
    pub username: String,
    /// Unique contact email
    pub email: String,
    /// Optional display name
    pub full_name: Option<String>,
    /// Optional contact phone
    pub phone_number: Option<String>,
    /// Opening balance, zero when absent
    pub initial_balance: Decimal,
}

/// Profile fields that may change after registration. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// New email, must stay unique
    pub email: Option<String>,
    /// New display name
    pub full_name: Option<String>,
    /// New phone number
    pub phone_number: Option<String>,
}

fn normalize_username(username: &str) -> Result<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::InvalidInput {
            message: "Username cannot be empty".to_string(),
        });
    }
    Ok(username.to_string())
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidInput {
            message: format!("Invalid email address '{email}'"),
        });
    }
    Ok(email.to_string())
}

fn duplicate_or_storage(err: DbErr, username: &str, email: &str) -> Error {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        Error::DuplicateUsernameOrEmail {
            username: username.to_string(),
            email: email.to_string(),
        }
    } else {
        err.into()
    }
}

/// Registers a new user, recording any opening balance as a `DEPOSIT` row.
pub async fn register_user(db: &DatabaseConnection, new_user: NewUser) -> Result<user::Model> {
    let username = normalize_username(&new_user.username)?;
    let email = normalize_email(&new_user.email)?;
    let opening = money::to_non_negative_minor_units(new_user.initial_balance)?;

    let txn = db.begin().await?;
    let outcome = insert_registration(
        &txn,
        user::ActiveModel {
            username: Set(username.clone()),
            email: Set(email.clone()),
            full_name: Set(new_user.full_name),
            phone_number: Set(new_user.phone_number),
            balance: Set(opening),
            is_active: Set(true),
            ..Default::default()
        },
        (username.as_str(), email.as_str()),
        opening,
    )
    .await;

    let created = store::settle(txn, outcome)
        .await
        .inspect_err(|e| warn!(%username, error = %e, "Registration rejected"))?;
    info!(user_id = created.id, %username, "User registered");
    Ok(created)
}

async fn insert_registration<C>(
    conn: &C,
    mut model: user::ActiveModel,
    (username, email): (&str, &str),
    opening: i64,
) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let existing = User::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(username))
                .add(user::Column::Email.eq(email)),
        )
        .one(conn)
        .await?;
    if existing.is_some() {
        return Err(Error::DuplicateUsernameOrEmail {
            username: username.to_string(),
            email: email.to_string(),
        });
    }

    let now = Utc::now();
    model.created_at = Set(now);
    model.updated_at = Set(now);
    let created = model
        .insert(conn)
        .await
        .map_err(|e| duplicate_or_storage(e, username, email))?;

    if opening > 0 {
        let entry = NewEntry {
            description: Some("Initial balance".to_string()),
            ..NewEntry::new(created.id, TransactionKind::Deposit, opening)
        };
        store::insert_entry(conn, entry).await?;
    }
    Ok(created)
}

/// Applies the set fields of `update` to a user's profile.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: i64,
    update: UserUpdate,
) -> Result<user::Model> {
    let existing = get_user(db, user_id)
        .await?
        .ok_or(Error::UserNotFound { user_id })?;

    let email = update.email.as_deref().map(normalize_email).transpose()?;
    if let Some(email) = &email {
        let taken = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .filter(user::Column::Id.ne(user_id))
            .one(db)
            .await?;
        if taken.is_some() {
            return Err(Error::DuplicateUsernameOrEmail {
                username: existing.username,
                email: email.clone(),
            });
        }
    }

    let username = existing.username.clone();
    let mut active: user::ActiveModel = existing.into();
    if let Some(email) = email.clone() {
        active.email = Set(email);
    }
    if let Some(full_name) = update.full_name {
        active.full_name = Set(Some(full_name));
    }
    if let Some(phone_number) = update.phone_number {
        active.phone_number = Set(Some(phone_number));
    }
    active.updated_at = Set(Utc::now());

    // Only the columns set above are written, the balance is left to the ledger
    let updated = active.update(db).await.map_err(|e| {
        duplicate_or_storage(e, &username, email.as_deref().unwrap_or_default())
    })?;
    info!(user_id, "Profile updated");
    Ok(updated)
}

/// Marks a user inactive. Inactive users are rejected by every ledger operation.
pub async fn deactivate_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let existing = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { user_id })?;

    let mut active: user::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;
    info!(user_id, "User deactivated");
    Ok(updated)
}

/// Finds a user by id, active or not.
pub async fn get_user<C>(db: &C, user_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by username.
pub async fn get_user_by_username<C>(db: &C, username: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Username.eq(username.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a user by email.
pub async fn get_user_by_email<C>(db: &C, email: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Email.eq(email.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all active users, ordered alphabetically by username.
pub async fn get_all_active_users<C>(db: &C) -> Result<Vec<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::IsActive.eq(true))
        .order_by_asc(user::Column::Username)
        .all(db)
        .await
        .map_err(Into::into)
}
