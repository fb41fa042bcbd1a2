//! The money-transfer ledger.
//!
//! [`Store`] owns the connection pool and exposes three layers:
//!
//! - [`Store::queries`]: plain CRUD ([`LedgerStore`]) on the pool.
//! - [`Store::exec_tx`]: runs a unit of work on a transaction-bound
//!   [`Queries`] handle, committing on success and rolling back on error.
//! - [`Store::transfer_tx`]: the atomic transfer between two accounts.
//!
//! The store keeps no state besides the pool; balances live only in the
//! database.
use sea_orm::DatabaseConnection;

pub use accounts::Account;
pub use currency::Currency;
pub use entries::Entry;
pub use error::LedgerError;
pub use ops::{TransferTxParams, TransferTxResult, TxFuture, ordered_pair};
pub use store::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    CreateUserParams, LedgerStore, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Queries,
};
pub use transfers::Transfer;
pub use users::User;

pub mod accounts;
mod currency;
pub mod entries;
mod error;
mod ops;
mod store;
pub mod transfers;
pub mod users;

pub type ResultLedger<T> = Result<T, LedgerError>;

#[derive(Clone, Debug)]
pub struct Store {
    database: DatabaseConnection,
}

impl Store {
    /// Return a builder for `Store`. Help to build the struct.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// CRUD operations running directly on the connection pool, outside any
    /// transaction.
    pub fn queries(&self) -> Queries<'_, DatabaseConnection> {
        Queries::new(&self.database)
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

/// The builder for `Store`
#[derive(Default)]
pub struct StoreBuilder {
    database: DatabaseConnection,
}

impl StoreBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> StoreBuilder {
        self.database = db;
        self
    }

    /// Construct `Store`, checking that the database answers.
    pub async fn build(self) -> ResultLedger<Store> {
        self.database.ping().await?;
        Ok(Store {
            database: self.database,
        })
    }
}
