//! Property-based tests for ledger invariants
//!
//! These tests drive the public API against an in-memory `SQLite` store and check:
//! - Conservation: balances change only by committed credits and debits
//! - Non-negativity: no sequence of operations drives a balance below zero
//! - Replay: every balance equals the signed sum of its owner's rows
//! - Pairing: each `TRANSFER_OUT` has exactly one matching `TRANSFER_IN`
//! - Atomicity: a failed transfer leaves neither row nor balance change behind

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use wallet_ledger::{
    config::database,
    core::{
        Ledger, UserLocks,
        user::{self, NewUser},
    },
    entities::{Transaction, TransactionColumn, TransactionKind, TransactionModel},
    errors::Error,
};

const USERS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Credit { user: usize, cents: i64 },
    Debit { user: usize, cents: i64 },
    Transfer { from: usize, to: usize, cents: i64 },
}

/// Strategy for generating amounts between 0.01 and 500.00
fn cents_strategy() -> impl Strategy<Value = i64> {
    1i64..50_000i64
}

/// Strategy for generating ledger operations over a fixed set of users
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..USERS, cents_strategy()).prop_map(|(user, cents)| Op::Credit { user, cents }),
        (0..USERS, cents_strategy()).prop_map(|(user, cents)| Op::Debit { user, cents }),
        (0..USERS, 0..USERS, cents_strategy())
            .prop_map(|(from, to, cents)| Op::Transfer { from, to, cents }),
    ]
}

/// Create a ledger over a fresh in-memory store with funded users
async fn create_test_ledger(opening_cents: &[i64]) -> (Ledger, Vec<i64>) {
    let db = database::create_connection("sqlite::memory:").await.unwrap();
    database::create_tables(&db).await.unwrap();

    let mut ids = Vec::with_capacity(opening_cents.len());
    for (index, cents) in opening_cents.iter().enumerate() {
        let account = user::register_user(
            &db,
            NewUser {
                username: format!("user{index}"),
                email: format!("user{index}@example.com"),
                initial_balance: Decimal::new(*cents, 2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        ids.push(account.id);
    }

    (Ledger::new(db, UserLocks::new()), ids)
}

fn signed_amount(row: &TransactionModel) -> i64 {
    if row.kind.is_outflow() {
        -row.amount
    } else {
        row.amount
    }
}

async fn rows_for(db: &DatabaseConnection, user_id: i64) -> Vec<TransactionModel> {
    Transaction::find()
        .filter(TransactionColumn::UserId.eq(user_id))
        .all(db)
        .await
        .unwrap()
}

async fn stored_balance(db: &DatabaseConnection, user_id: i64) -> i64 {
    user::get_user(db, user_id).await.unwrap().unwrap().balance
}

/// Checks that every `TRANSFER_OUT` row has exactly one counterpart
async fn assert_transfers_paired(db: &DatabaseConnection) {
    let outgoing = Transaction::find()
        .filter(TransactionColumn::Kind.eq(TransactionKind::TransferOut))
        .all(db)
        .await
        .unwrap();

    for out in outgoing {
        let incoming = Transaction::find()
            .filter(TransactionColumn::PairedTransactionId.eq(out.id))
            .all(db)
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1, "transfer {} must have one incoming row", out.id);

        let incoming = &incoming[0];
        assert_eq!(incoming.kind, TransactionKind::TransferIn);
        assert_eq!(incoming.amount, out.amount);
        assert_eq!(Some(incoming.user_id), out.recipient_user_id);
        assert_eq!(incoming.sender_user_id, Some(out.user_id));
        assert_eq!(incoming.reference_transaction_id, out.reference_transaction_id);
        assert!(incoming.id > out.id);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: the ledger behaves like a simple balance model
    #[test]
    fn prop_balances_follow_model(
        opening in prop::collection::vec(0i64..20_000i64, USERS),
        ops in prop::collection::vec(op_strategy(), 1..30),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let (ledger, ids) = create_test_ledger(&opening).await;
            let mut model = opening.clone();

            for op in &ops {
                match *op {
                    Op::Credit { user, cents } => {
                        ledger.credit(ids[user], Decimal::new(cents, 2), None).await.unwrap();
                        model[user] += cents;
                    }
                    Op::Debit { user, cents } => {
                        let result = ledger.debit(ids[user], Decimal::new(cents, 2), None).await;
                        if model[user] >= cents {
                            prop_assert!(result.is_ok());
                            model[user] -= cents;
                        } else {
                            let is_insufficient = matches!(result, Err(Error::InsufficientFunds { .. }));
                            prop_assert!(is_insufficient);
                        }
                    }
                    Op::Transfer { from, to, cents } => {
                        let result = ledger
                            .transfer(ids[from], ids[to], Decimal::new(cents, 2), None, None)
                            .await;
                        if from == to {
                            let is_self = matches!(result, Err(Error::SelfTransferNotAllowed { .. }));
                            prop_assert!(is_self);
                        } else if model[from] >= cents {
                            prop_assert!(result.is_ok());
                            model[from] -= cents;
                            model[to] += cents;
                        } else {
                            let is_insufficient = matches!(result, Err(Error::InsufficientFunds { .. }));
                            prop_assert!(is_insufficient);
                        }
                    }
                }
            }

            for (index, id) in ids.iter().enumerate() {
                let balance = ledger.balance(*id).await.unwrap();
                prop_assert_eq!(balance, Decimal::new(model[index], 2));
                prop_assert!(balance >= Decimal::ZERO);
            }
            Ok(())
        })?;
    }

    /// Property: money moved by transfers is neither created nor destroyed
    #[test]
    fn prop_transfers_conserve_total(
        opening in prop::collection::vec(0i64..20_000i64, USERS),
        transfers in prop::collection::vec((0..USERS, 0..USERS, cents_strategy()), 1..30),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let (ledger, ids) = create_test_ledger(&opening).await;
            let total_before: i64 = opening.iter().sum();

            for (from, to, cents) in &transfers {
                // Rejections are expected here; only the totals matter
                let _ = ledger
                    .transfer(ids[*from], ids[*to], Decimal::new(*cents, 2), None, None)
                    .await;
            }

            let mut total_after = 0;
            for id in &ids {
                let balance = stored_balance(ledger.connection(), *id).await;
                prop_assert!(balance >= 0);
                total_after += balance;
            }
            prop_assert_eq!(total_before, total_after);
            Ok(())
        })?;
    }

    /// Property: a balance can always be rebuilt from its owner's rows
    #[test]
    fn prop_balance_replays_from_rows(
        opening in prop::collection::vec(0i64..20_000i64, USERS),
        ops in prop::collection::vec(op_strategy(), 1..30),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let (ledger, ids) = create_test_ledger(&opening).await;

            for op in &ops {
                let _ = match *op {
                    Op::Credit { user, cents } => ledger
                        .credit(ids[user], Decimal::new(cents, 2), None)
                        .await
                        .map(|_| ()),
                    Op::Debit { user, cents } => ledger
                        .debit(ids[user], Decimal::new(cents, 2), None)
                        .await
                        .map(|_| ()),
                    Op::Transfer { from, to, cents } => ledger
                        .transfer(ids[from], ids[to], Decimal::new(cents, 2), None, None)
                        .await
                        .map(|_| ()),
                };
            }

            for id in &ids {
                let replayed: i64 = rows_for(ledger.connection(), *id)
                    .await
                    .iter()
                    .map(signed_amount)
                    .sum();
                prop_assert_eq!(replayed, stored_balance(ledger.connection(), *id).await);
            }
            assert_transfers_paired(ledger.connection()).await;
            Ok(())
        })?;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_conserve_total() {
    let (ledger, ids) = create_test_ledger(&[10_000, 10_000, 10_000]).await;
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    let mut handles = Vec::new();
    for round in 0..20 {
        // Opposite directions on the same pair would deadlock with unordered locks
        let pairs = [(a, b), (b, a), (b, c), (c, a)];
        for (from, to) in pairs {
            let ledger = ledger.clone();
            let cents = 250 + i64::from(round % 7) * 100;
            handles.push(tokio::spawn(async move {
                ledger
                    .transfer(from, to, Decimal::new(cents, 2), None, None)
                    .await
            }));
        }
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(Error::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected transfer failure: {other}"),
        }
    }
    assert!(committed > 0);

    let mut total = 0;
    for id in &ids {
        let balance = stored_balance(ledger.connection(), *id).await;
        assert!(balance >= 0);
        total += balance;
    }
    assert_eq!(total, 30_000);
    assert_transfers_paired(ledger.connection()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let (ledger, ids) = create_test_ledger(&[1_000]).await;
    let user_id = ids[0];

    // 25 debits of 1.00 against a 10.00 balance: exactly ten can succeed
    let mut handles = Vec::new();
    for _ in 0..25 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.debit(user_id, Decimal::ONE, None).await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            committed += 1;
        }
    }

    assert_eq!(committed, 10);
    assert_eq!(ledger.balance(user_id).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn test_failed_transfer_leaves_no_trace() {
    let (ledger, ids) = create_test_ledger(&[10_000, 5_000]).await;
    let (alice, bob) = (ids[0], ids[1]);

    // Fail the second write of the unit, after both balances moved
    ledger
        .connection()
        .execute_unprepared(
            "CREATE TRIGGER reject_transfer_in BEFORE INSERT ON transactions \
             WHEN NEW.kind = 'TRANSFER_IN' \
             BEGIN SELECT RAISE(ABORT, 'injected storage fault'); END;",
        )
        .await
        .unwrap();

    let rows_before = Transaction::find().all(ledger.connection()).await.unwrap().len();

    let result = ledger
        .transfer(alice, bob, Decimal::new(2_500, 2), None, None)
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, Error::StorageFailure { .. }));
    assert!(err.is_retryable());

    assert_eq!(stored_balance(ledger.connection(), alice).await, 10_000);
    assert_eq!(stored_balance(ledger.connection(), bob).await, 5_000);
    let rows_after = Transaction::find().all(ledger.connection()).await.unwrap().len();
    assert_eq!(rows_before, rows_after);

    // The store stays usable once the fault is gone
    ledger
        .connection()
        .execute_unprepared("DROP TRIGGER reject_transfer_in;")
        .await
        .unwrap();
    let receipt = ledger
        .transfer(alice, bob, Decimal::new(2_500, 2), None, None)
        .await
        .unwrap();
    assert_eq!(receipt.incoming.paired_transaction_id, Some(receipt.outgoing.id));
    assert_eq!(ledger.balance(alice).await.unwrap(), Decimal::new(7_500, 2));
    assert_eq!(ledger.balance(bob).await.unwrap(), Decimal::new(7_500, 2));
}

#[tokio::test]
async fn test_refunds_never_create_money() {
    let (ledger, ids) = create_test_ledger(&[10_000, 0]).await;
    let (alice, bob) = (ids[0], ids[1]);

    let purchase = ledger
        .debit(alice, Decimal::new(4_000, 2), Some("Dinner".to_string()))
        .await
        .unwrap();
    let receipt = ledger
        .transfer(alice, bob, Decimal::new(2_000, 2), None, Some(purchase.id))
        .await
        .unwrap();

    // Transfers are settled between wallets and cannot be refunded
    let result = ledger
        .refund(alice, Decimal::new(2_000, 2), receipt.outgoing.id, None)
        .await;
    assert!(matches!(result, Err(Error::InvalidReference { .. })));

    let refund = ledger
        .refund(alice, Decimal::new(1_500, 2), purchase.id, None)
        .await
        .unwrap();
    assert_eq!(refund.reference_transaction_id, Some(purchase.id));

    // Refunds may not exceed what went out
    let result = ledger
        .refund(alice, Decimal::new(2_600, 2), purchase.id, None)
        .await;
    assert!(matches!(result, Err(Error::InvalidReference { .. })));

    let linked: Vec<i64> = ledger
        .linked(purchase.id)
        .await
        .unwrap()
        .iter()
        .map(|row| row.id)
        .collect();
    assert_eq!(
        linked,
        vec![receipt.outgoing.id, receipt.incoming.id, refund.id]
    );

    // Only the external debit and its refund moved the total
    let total: i64 = stored_balance(ledger.connection(), alice).await
        + stored_balance(ledger.connection(), bob).await;
    assert_eq!(total, 10_000 - 4_000 + 1_500);
    assert_eq!(ledger.balance(alice).await.unwrap(), Decimal::new(5_500, 2));
    assert_eq!(ledger.balance(bob).await.unwrap(), Decimal::new(2_000, 2));
}
