use std::{future::Future, pin::Pin};

use sea_orm::{DatabaseTransaction, TransactionTrait};

use crate::{LedgerError, Queries, ResultLedger, Store};

mod transfer;

pub use transfer::{TransferTxParams, TransferTxResult, ordered_pair};

/// Future returned by a unit of work passed to [`Store::exec_tx`].
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = ResultLedger<T>> + Send + 'c>>;

impl Store {
    /// Runs `f` inside a single database transaction.
    ///
    /// `f` only ever sees the transaction-bound handle. On `Ok` the
    /// transaction is committed; on `Err` it is rolled back and the error is
    /// returned unchanged, or wrapped in [`LedgerError::RollbackFailure`] when
    /// the rollback fails as well. Dropping the returned future rolls the
    /// transaction back.
    pub async fn exec_tx<T, F>(&self, f: F) -> ResultLedger<T>
    where
        T: Send,
        F: for<'c> FnOnce(Queries<'c, DatabaseTransaction>) -> TxFuture<'c, T> + Send,
    {
        let db_tx = self.database.begin().await?;
        let result = f(Queries::new(&db_tx)).await;
        match result {
            Ok(value) => {
                db_tx.commit().await?;
                Ok(value)
            }
            Err(err) => match db_tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback_err) => Err(LedgerError::RollbackFailure {
                    error: Box::new(err),
                    rollback: rollback_err.to_string(),
                }),
            },
        }
    }
}
