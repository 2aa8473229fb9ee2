//! Concurrent CHARGE and USE against shared accounts.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect

use futures::future::join_all;
use keyguard_core::LedgerError;
use keyguard_core::ledger::{TransactionKind, UserId, replay_balance};
use keyguard_ledger::{BalanceLedger, LedgerEnvironment};
use keyguard_runtime::{EngineConfig, KeyedLockRegistry};
use keyguard_testing::{
    InMemoryBalanceStore, InMemoryHistoryStore, SlowBalanceStore, init_test_tracing, test_clock,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn ledger_with(balances: InMemoryBalanceStore) -> (BalanceLedger, InMemoryHistoryStore) {
    init_test_tracing();
    let history = InMemoryHistoryStore::new();
    let env = LedgerEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(balances),
        Arc::new(history.clone()),
    );
    (BalanceLedger::new(env, &EngineConfig::default()), history)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn ten_concurrent_charges_all_land() {
    let (ledger, _) = ledger_with(InMemoryBalanceStore::new());
    let user = UserId::new(1);

    let tasks = (0..10).map(|_| {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.charge(user, 100).await })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(ledger.balance(user).await.unwrap().balance, 1000);
    assert_eq!(ledger.history(user).await.unwrap().len(), 10);
    assert!(ledger.locks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_uses_never_over_debit() {
    let user = UserId::new(7);
    let (ledger, _) = ledger_with(InMemoryBalanceStore::new().with_balance(user, 1_000));

    let tasks = (0..25).map(|_| {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.use_points(user, 100).await })
    });

    let mut succeeded = 0;
    let mut insufficient = 0;
    for result in join_all(tasks).await {
        match result.unwrap() {
            Ok(account) => {
                assert!(account.balance >= 0);
                succeeded += 1;
            }
            Err(LedgerError::InsufficientFunds { balance, requested }) => {
                assert_eq!((balance, requested), (0, 100));
                insufficient += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(insufficient, 15);
    assert_eq!(ledger.balance(user).await.unwrap().balance, 0);
    assert_eq!(ledger.history(user).await.unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn mixed_mutations_form_a_serial_history() {
    let user = UserId::new(3);
    let (ledger, _) = ledger_with(InMemoryBalanceStore::new().with_balance(user, 500));

    let tasks = (0..40_i64).map(|i| {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            if i % 2 == 0 {
                ledger.charge(user, 10 + i).await
            } else {
                ledger.use_points(user, 20).await
            }
        })
    });

    let mut observed = Vec::new();
    for result in join_all(tasks).await {
        if let Ok(account) = result.unwrap() {
            observed.push(account.balance);
        }
    }

    let history = ledger.history(user).await.unwrap();
    let final_balance = ledger.balance(user).await.unwrap().balance;

    assert_eq!(history.len(), observed.len());
    assert_eq!(500 + replay_balance(&history), final_balance);

    // Every returned balance is one of the partial sums of the history.
    let mut running = 500;
    let mut partial_sums = Vec::new();
    for entry in &history {
        running += entry.signed_amount();
        partial_sums.push(running);
    }
    observed.sort_unstable();
    partial_sums.sort_unstable();
    assert_eq!(observed, partial_sums);
    assert!(
        history
            .windows(2)
            .all(|pair| pair[0].id < pair[1].id)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_accounts_do_not_block_each_other() {
    init_test_tracing();
    let slow = UserId::new(1);
    let fast = UserId::new(2);

    // Loads for every account take 300ms; only the slow account is contended.
    let balances = SlowBalanceStore::new(InMemoryBalanceStore::new(), Duration::from_millis(300));
    let env = LedgerEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(balances),
        Arc::new(InMemoryHistoryStore::new()),
    );
    let ledger = BalanceLedger::new(env, &EngineConfig::default());

    let started = Instant::now();
    let slow_calls: Vec<_> = (0..3)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.charge(slow, 1).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    ledger.charge(fast, 1).await.unwrap();
    let fast_done = started.elapsed();

    for call in join_all(slow_calls).await {
        call.unwrap().unwrap();
    }
    let all_done = started.elapsed();

    assert!(fast_done < Duration::from_millis(600), "{fast_done:?}");
    assert!(all_done >= Duration::from_millis(900), "{all_done:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contended_account_times_out_without_writing() {
    init_test_tracing();
    let user = UserId::new(5);
    let balances = InMemoryBalanceStore::new().with_balance(user, 50);
    let history = InMemoryHistoryStore::new();
    let env = LedgerEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(SlowBalanceStore::new(balances.clone(), Duration::from_millis(400))),
        Arc::new(history.clone()),
    );
    let ledger = BalanceLedger::with_locks(
        env,
        KeyedLockRegistry::new(Duration::from_millis(50)),
        1_000_000,
    );

    let holder = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.charge(user, 10).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = ledger.use_points(user, 10).await.unwrap_err();
    assert_eq!(err.code(), "LOCK_TIMEOUT");
    assert!(keyguard_core::Transient::is_transient(&err));

    assert_eq!(holder.await.unwrap().unwrap().balance, 60);
    assert_eq!(balances.balance_of(user), Some(60));
    let entries = history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, TransactionKind::Charge);
}
