use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

use crate::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, LedgerError,
    LedgerStore, Queries, ResultLedger, Store, Transfer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything a committed transfer produced.
///
/// `from_*` and `to_*` follow the call arguments, not the order in which the
/// rows were locked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}

/// Canonical lock order for two accounts: lower id first.
///
/// Every code path that mutates two balances in one transaction goes through
/// this order, so two transfers sharing both accounts always queue on the same
/// row first and can never wait on each other in a cycle.
pub fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Store {
    /// Moves `amount` from one account to another atomically.
    ///
    /// Inside one transaction: records the transfer, appends a debit entry for
    /// the source and a credit entry for the destination, then updates both
    /// balances in ascending account id order. Any failure rolls everything
    /// back. Deadlock or serialization aborts are returned as
    /// [`LedgerError::TransactionAbort`] and are not retried here.
    ///
    /// Balances are allowed to go negative, and `from == to` is accepted.
    pub async fn transfer_tx(&self, arg: TransferTxParams) -> ResultLedger<TransferTxResult> {
        if arg.amount <= 0 {
            return Err(LedgerError::InvalidAmount(
                "amount must be > 0".to_string(),
            ));
        }

        self.exec_tx(move |q| {
            Box::pin(async move {
                let transfer = q
                    .create_transfer(CreateTransferParams {
                        from_account_id: arg.from_account_id,
                        to_account_id: arg.to_account_id,
                        amount: arg.amount,
                    })
                    .await?;

                let from_entry = q
                    .create_entry(CreateEntryParams {
                        account_id: arg.from_account_id,
                        amount: -arg.amount,
                    })
                    .await?;

                let to_entry = q
                    .create_entry(CreateEntryParams {
                        account_id: arg.to_account_id,
                        amount: arg.amount,
                    })
                    .await?;

                let debit = AddAccountBalanceParams {
                    id: arg.from_account_id,
                    amount: -arg.amount,
                };
                let credit = AddAccountBalanceParams {
                    id: arg.to_account_id,
                    amount: arg.amount,
                };
                let (from_account, to_account) =
                    if ordered_pair(arg.from_account_id, arg.to_account_id).0
                        == arg.from_account_id
                    {
                        add_money(q, debit, credit).await?
                    } else {
                        let (to_account, from_account) = add_money(q, credit, debit).await?;
                        (from_account, to_account)
                    };

                Ok::<_, LedgerError>(TransferTxResult {
                    transfer,
                    from_entry,
                    to_entry,
                    from_account,
                    to_account,
                })
            })
        })
        .await
    }
}

/// Applies two balance deltas in the given order, returning the updated
/// accounts in the same order. Callers pass the lower account id first.
async fn add_money<C: ConnectionTrait>(
    q: Queries<'_, C>,
    first: AddAccountBalanceParams,
    second: AddAccountBalanceParams,
) -> ResultLedger<(Account, Account)> {
    let first = q.add_account_balance(first).await?;
    let second = q.add_account_balance(second).await?;
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_keeps_ascending_input() {
        assert_eq!(ordered_pair(1, 2), (1, 2));
    }

    #[test]
    fn ordered_pair_swaps_descending_input() {
        assert_eq!(ordered_pair(9, 3), (3, 9));
    }

    #[test]
    fn ordered_pair_agrees_for_both_directions() {
        for (a, b) in [(4, 17), (-5, 2), (i64::MIN, i64::MAX)] {
            assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
        }
    }

    #[test]
    fn ordered_pair_accepts_same_id() {
        assert_eq!(ordered_pair(7, 7), (7, 7));
    }
}
