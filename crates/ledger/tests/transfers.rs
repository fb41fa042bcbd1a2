use std::collections::HashSet;

use ledger::{
    Account, CreateEntryParams, LedgerError, LedgerStore, ListEntriesParams, ListTransfersParams,
    Store, TransferTxParams, TransferTxResult,
};
use sea_orm::ConnectionTrait;
use tokio::task::JoinSet;

mod common;

use common::{create_random_account, store_with_db};

async fn balance(store: &Store, account: &Account) -> i64 {
    store.queries().get_account(account.id).await.unwrap().balance
}

async fn entry_count(store: &Store, account: &Account) -> usize {
    store
        .queries()
        .list_entries(ListEntriesParams {
            account_id: account.id,
            limit: 100,
            offset: 0,
        })
        .await
        .unwrap()
        .len()
}

async fn transfer_count(store: &Store, account: &Account) -> usize {
    store
        .queries()
        .list_transfers(ListTransfersParams {
            from_account_id: account.id,
            to_account_id: account.id,
            limit: 100,
            offset: 0,
        })
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn transfer_moves_funds_and_records_everything() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;
    let b = create_random_account(&store, 50).await;

    let result = store
        .transfer_tx(TransferTxParams {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: 10,
        })
        .await
        .unwrap();

    assert!(result.transfer.id > 0);
    assert_eq!(result.transfer.from_account_id, a.id);
    assert_eq!(result.transfer.to_account_id, b.id);
    assert_eq!(result.transfer.amount, 10);

    assert_eq!(result.from_entry.account_id, a.id);
    assert_eq!(result.from_entry.amount, -10);
    assert_eq!(result.to_entry.account_id, b.id);
    assert_eq!(result.to_entry.amount, 10);

    assert_eq!(result.from_account.id, a.id);
    assert_eq!(result.from_account.balance, 90);
    assert_eq!(result.to_account.id, b.id);
    assert_eq!(result.to_account.balance, 60);

    assert_eq!(balance(&store, &a).await, 90);
    assert_eq!(balance(&store, &b).await, 60);

    let q = store.queries();
    assert_eq!(q.get_transfer(result.transfer.id).await.unwrap(), result.transfer);
    assert_eq!(q.get_entry(result.from_entry.id).await.unwrap(), result.from_entry);
    assert_eq!(q.get_entry(result.to_entry.id).await.unwrap(), result.to_entry);
}

#[tokio::test]
async fn result_follows_argument_order_when_ids_descend() {
    let store = store_with_db().await;
    let low = create_random_account(&store, 100).await;
    let high = create_random_account(&store, 100).await;
    assert!(low.id < high.id);

    let result = store
        .transfer_tx(TransferTxParams {
            from_account_id: high.id,
            to_account_id: low.id,
            amount: 25,
        })
        .await
        .unwrap();

    assert_eq!(result.from_account.id, high.id);
    assert_eq!(result.from_account.balance, 75);
    assert_eq!(result.to_account.id, low.id);
    assert_eq!(result.to_account.balance, 125);
    assert_eq!(result.from_entry.account_id, high.id);
    assert_eq!(result.to_entry.account_id, low.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_each_apply_once() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 1_000).await;
    let b = create_random_account(&store, 1_000).await;

    let n = 5;
    let amount = 10;
    let mut tasks = JoinSet::new();
    for _ in 0..n {
        let store = store.clone();
        let params = TransferTxParams {
            from_account_id: a.id,
            to_account_id: b.id,
            amount,
        };
        tasks.spawn(async move { store.transfer_tx(params).await });
    }

    let mut seen = HashSet::new();
    let mut results: Vec<TransferTxResult> = Vec::with_capacity(n);
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.unwrap().unwrap());
    }
    assert_eq!(results.len(), n);

    for result in &results {
        assert_eq!(result.transfer.from_account_id, a.id);
        assert_eq!(result.transfer.to_account_id, b.id);
        assert_eq!(result.from_entry.amount, -amount);
        assert_eq!(result.to_entry.amount, amount);

        let diff_from = a.balance - result.from_account.balance;
        let diff_to = result.to_account.balance - b.balance;
        assert_eq!(diff_from, diff_to);
        assert_eq!(diff_from % amount, 0);
        let k = diff_from / amount;
        assert!((1..=n as i64).contains(&k));
        // Every transfer observed a distinct committed state.
        assert!(seen.insert(k), "balance step {k} observed twice");
    }

    assert_eq!(balance(&store, &a).await, a.balance - n as i64 * amount);
    assert_eq!(balance(&store, &b).await, b.balance + n as i64 * amount);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_direction_transfers_do_not_deadlock() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 500).await;
    let b = create_random_account(&store, 500).await;

    let n = 10;
    let mut tasks = JoinSet::new();
    for i in 0..n {
        let store = store.clone();
        let (from, to) = if i % 2 == 1 { (b.id, a.id) } else { (a.id, b.id) };
        tasks.spawn(async move {
            store
                .transfer_tx(TransferTxParams {
                    from_account_id: from,
                    to_account_id: to,
                    amount: 10,
                })
                .await
        });
    }

    let mut completed = 0;
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
        completed += 1;
    }
    assert_eq!(completed, n);

    assert_eq!(balance(&store, &a).await, a.balance);
    assert_eq!(balance(&store, &b).await, b.balance);
    assert_eq!(entry_count(&store, &a).await, n);
    assert_eq!(entry_count(&store, &b).await, n);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disjoint_pairs_all_complete() {
    let store = store_with_db().await;
    let k = 6;
    let mut pairs = Vec::with_capacity(k);
    for _ in 0..k {
        let from = create_random_account(&store, 300).await;
        let to = create_random_account(&store, 0).await;
        pairs.push((from, to));
    }

    let mut tasks = JoinSet::new();
    for (from, to) in &pairs {
        let store = store.clone();
        let params = TransferTxParams {
            from_account_id: from.id,
            to_account_id: to.id,
            amount: 120,
        };
        tasks.spawn(async move { store.transfer_tx(params).await });
    }

    let mut completed = 0;
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
        completed += 1;
    }
    assert_eq!(completed, k);

    for (from, to) in &pairs {
        assert_eq!(balance(&store, from).await, 180);
        assert_eq!(balance(&store, to).await, 120);
    }
}

#[tokio::test]
async fn sequence_of_transfers_conserves_total_balance() {
    let store = store_with_db().await;
    let accounts = vec![
        create_random_account(&store, 1_000).await,
        create_random_account(&store, 250).await,
        create_random_account(&store, 0).await,
    ];
    let total_before: i64 = accounts.iter().map(|a| a.balance).sum();

    let moves = [(0, 1, 300), (1, 2, 400), (2, 0, 50), (0, 2, 900), (2, 1, 1)];
    for (from, to, amount) in moves {
        store
            .transfer_tx(TransferTxParams {
                from_account_id: accounts[from].id,
                to_account_id: accounts[to].id,
                amount,
            })
            .await
            .unwrap();
    }

    let mut total_after = 0;
    for account in &accounts {
        total_after += balance(&store, account).await;
    }
    assert_eq!(total_before, total_after);
    // Overdraft is not checked by the ledger.
    assert_eq!(balance(&store, &accounts[0]).await, -150);
}

#[tokio::test]
async fn transfer_to_missing_account_leaves_no_trace() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;

    let err = store
        .transfer_tx(TransferTxParams {
            from_account_id: a.id,
            to_account_id: a.id + 1_000,
            amount: 10,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ConstraintViolation(_)), "{err:?}");

    assert_eq!(balance(&store, &a).await, 100);
    assert_eq!(entry_count(&store, &a).await, 0);
    assert_eq!(transfer_count(&store, &a).await, 0);
}

#[tokio::test]
async fn failure_in_balance_step_rolls_back_earlier_rows() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;
    let b = create_random_account(&store, i64::MAX - 5).await;

    let err = store
        .transfer_tx(TransferTxParams {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: 10,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)), "{err:?}");

    // The debit on `a` ran before the overflow on `b` and must be gone too.
    assert_eq!(balance(&store, &a).await, 100);
    assert_eq!(balance(&store, &b).await, i64::MAX - 5);
    assert_eq!(entry_count(&store, &a).await, 0);
    assert_eq!(entry_count(&store, &b).await, 0);
    assert_eq!(transfer_count(&store, &a).await, 0);
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;
    let b = create_random_account(&store, 100).await;

    for amount in [0, -10] {
        let err = store
            .transfer_tx(TransferTxParams {
                from_account_id: a.id,
                to_account_id: b.id,
                amount,
            })
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidAmount("amount must be > 0".to_string()));
    }
    assert_eq!(transfer_count(&store, &a).await, 0);
}

#[tokio::test]
async fn self_transfer_keeps_balance_and_writes_both_entries() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;

    let result = store
        .transfer_tx(TransferTxParams {
            from_account_id: a.id,
            to_account_id: a.id,
            amount: 40,
        })
        .await
        .unwrap();

    assert_eq!(result.from_account.balance, 60);
    assert_eq!(result.to_account.balance, 100);
    assert_eq!(balance(&store, &a).await, 100);
    assert_eq!(entry_count(&store, &a).await, 2);
}

#[tokio::test]
async fn exec_tx_rolls_back_and_returns_the_error() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;
    let account_id = a.id;

    let err = store
        .exec_tx(move |q| {
            Box::pin(async move {
                q.create_entry(CreateEntryParams {
                    account_id,
                    amount: 5,
                })
                .await?;
                Err::<(), _>(LedgerError::InvalidAmount("stop".to_string()))
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::InvalidAmount("stop".to_string()));
    assert_eq!(entry_count(&store, &a).await, 0);
}

#[tokio::test]
async fn exec_tx_classifies_a_failed_commit() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;

    // Foreign keys are checked at COMMIT, so the insert below only fails there.
    let err = store
        .exec_tx(|q| {
            Box::pin(async move {
                q.connection()
                    .execute_unprepared("PRAGMA defer_foreign_keys = ON")
                    .await?;
                q.create_entry(CreateEntryParams {
                    account_id: 4242,
                    amount: 5,
                })
                .await?;
                Ok::<_, LedgerError>(())
            })
        })
        .await
        .unwrap_err();

    assert!(
        matches!(err, LedgerError::ConstraintViolation(_)),
        "unexpected error: {err:?}"
    );
    assert!(!err.is_retryable());

    // The pool is still usable and nothing was written.
    let entries = store
        .queries()
        .list_entries(ListEntriesParams {
            account_id: 4242,
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();
    assert!(entries.is_empty());
    assert_eq!(balance(&store, &a).await, 100);
}

#[tokio::test]
async fn exec_tx_commits_on_success() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;
    let account_id = a.id;

    let entry = store
        .exec_tx(move |q| {
            Box::pin(async move {
                let entry = q
                    .create_entry(CreateEntryParams {
                        account_id,
                        amount: 5,
                    })
                    .await?;
                Ok::<_, LedgerError>(entry)
            })
        })
        .await
        .unwrap();

    assert_eq!(store.queries().get_entry(entry.id).await.unwrap(), entry);
}

#[tokio::test]
async fn reads_are_stable_between_mutations() {
    let store = store_with_db().await;
    let a = create_random_account(&store, 100).await;
    let b = create_random_account(&store, 100).await;
    let result = store
        .transfer_tx(TransferTxParams {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: 1,
        })
        .await
        .unwrap();

    let q = store.queries();
    let first = (
        q.get_account(a.id).await.unwrap(),
        q.get_entry(result.from_entry.id).await.unwrap(),
        q.get_transfer(result.transfer.id).await.unwrap(),
    );
    let second = (
        q.get_account(a.id).await.unwrap(),
        q.get_entry(result.from_entry.id).await.unwrap(),
        q.get_transfer(result.transfer.id).await.unwrap(),
    );
    assert_eq!(first, second);
}
