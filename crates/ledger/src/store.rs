//! CRUD persistence for users, accounts, entries and transfers.
//!
//! Every operation is written against a sea-orm [`ConnectionTrait`], so the
//! same code runs on the connection pool ([`Store::queries`]) and on a live
//! transaction ([`Store::exec_tx`]). Which one is used is decided by whoever
//! builds the [`Queries`] handle, never by the operation itself.
//!
//! [`Store::queries`]: crate::Store::queries
//! [`Store::exec_tx`]: crate::Store::exec_tx

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::LockType,
};

use crate::{
    Account, Currency, Entry, LedgerError, ResultLedger, Transfer, User, accounts, entries,
    transfers, users,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateUserParams {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: Currency,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListAccountsParams {
    pub owner: String,
    pub limit: u64,
    pub offset: u64,
}

/// Signed delta applied to one account balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddAccountBalanceParams {
    pub id: i64,
    pub amount: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Lists transfers leaving `from_account_id` or arriving at `to_account_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: u64,
    pub offset: u64,
}

/// The ledger persistence contract.
///
/// Implementations carry no concurrency logic of their own: atomicity comes
/// from running them on a transaction handle.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_user(&self, arg: CreateUserParams) -> ResultLedger<User>;
    async fn get_user(&self, username: &str) -> ResultLedger<User>;

    async fn create_account(&self, arg: CreateAccountParams) -> ResultLedger<Account>;
    async fn get_account(&self, id: i64) -> ResultLedger<Account>;
    /// Reads the account and holds a row lock on it until the enclosing
    /// transaction ends.
    ///
    /// The lock is `FOR NO KEY UPDATE`: it excludes other balance writers but
    /// not the `KEY SHARE` locks taken by inserts referencing the account, so
    /// entries and transfers can still be written against it.
    async fn get_account_for_update(&self, id: i64) -> ResultLedger<Account>;
    async fn list_accounts(&self, arg: ListAccountsParams) -> ResultLedger<Vec<Account>>;
    /// Locks the row through [`LedgerStore::get_account_for_update`], adds
    /// `arg.amount` to the balance and returns the updated account. Must run
    /// on a transaction handle to be meaningful.
    async fn add_account_balance(&self, arg: AddAccountBalanceParams) -> ResultLedger<Account>;
    async fn delete_account(&self, id: i64) -> ResultLedger<()>;

    async fn create_entry(&self, arg: CreateEntryParams) -> ResultLedger<Entry>;
    async fn get_entry(&self, id: i64) -> ResultLedger<Entry>;
    async fn list_entries(&self, arg: ListEntriesParams) -> ResultLedger<Vec<Entry>>;

    async fn create_transfer(&self, arg: CreateTransferParams) -> ResultLedger<Transfer>;
    async fn get_transfer(&self, id: i64) -> ResultLedger<Transfer>;
    async fn list_transfers(&self, arg: ListTransfersParams) -> ResultLedger<Vec<Transfer>>;
}

/// [`LedgerStore`] bound to a connection: either the pool
/// (`DatabaseConnection`) or a live `DatabaseTransaction`.
#[derive(Clone, Copy, Debug)]
pub struct Queries<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> Queries<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// The underlying pool or transaction.
    pub fn connection(&self) -> &'c C {
        self.conn
    }

    async fn find_account(&self, id: i64, lock: bool) -> ResultLedger<accounts::Model> {
        let mut select = accounts::Entity::find_by_id(id);
        if lock {
            select = select.lock(LockType::NoKeyUpdate);
        }
        select
            .one(self.conn)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {id}")))
    }
}

#[async_trait]
impl<'c, C> LedgerStore for Queries<'c, C>
where
    C: ConnectionTrait,
{
    async fn create_user(&self, arg: CreateUserParams) -> ResultLedger<User> {
        let now = Utc::now();
        let model = users::ActiveModel {
            username: ActiveValue::Set(arg.username),
            hashed_password: ActiveValue::Set(arg.hashed_password),
            full_name: ActiveValue::Set(arg.full_name),
            email: ActiveValue::Set(arg.email),
            password_changed_at: ActiveValue::Set(now),
            created_at: ActiveValue::Set(now),
        }
        .insert(self.conn)
        .await?;
        Ok(User::from(model))
    }

    async fn get_user(&self, username: &str) -> ResultLedger<User> {
        users::Entity::find_by_id(username.to_string())
            .one(self.conn)
            .await?
            .map(User::from)
            .ok_or_else(|| LedgerError::NotFound(format!("user {username}")))
    }

    async fn create_account(&self, arg: CreateAccountParams) -> ResultLedger<Account> {
        let model = accounts::ActiveModel {
            owner: ActiveValue::Set(arg.owner),
            balance: ActiveValue::Set(arg.balance),
            currency: ActiveValue::Set(arg.currency.code().to_string()),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;
        Account::try_from(model)
    }

    async fn get_account(&self, id: i64) -> ResultLedger<Account> {
        Account::try_from(self.find_account(id, false).await?)
    }

    async fn get_account_for_update(&self, id: i64) -> ResultLedger<Account> {
        Account::try_from(self.find_account(id, true).await?)
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> ResultLedger<Vec<Account>> {
        accounts::Entity::find()
            .filter(accounts::Column::Owner.eq(arg.owner))
            .order_by_asc(accounts::Column::Id)
            .limit(arg.limit)
            .offset(arg.offset)
            .all(self.conn)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    async fn add_account_balance(&self, arg: AddAccountBalanceParams) -> ResultLedger<Account> {
        let account = self.get_account_for_update(arg.id).await?;
        let balance = account.balance.checked_add(arg.amount).ok_or_else(|| {
            LedgerError::InvalidAmount(format!("balance overflow on account {}", arg.id))
        })?;

        let model = accounts::ActiveModel {
            id: ActiveValue::Unchanged(account.id),
            balance: ActiveValue::Set(balance),
            ..Default::default()
        }
        .update(self.conn)
        .await?;
        Account::try_from(model)
    }

    async fn delete_account(&self, id: i64) -> ResultLedger<()> {
        let res = accounts::Entity::delete_by_id(id).exec(self.conn).await?;
        if res.rows_affected == 0 {
            return Err(LedgerError::NotFound(format!("account {id}")));
        }
        Ok(())
    }

    async fn create_entry(&self, arg: CreateEntryParams) -> ResultLedger<Entry> {
        let model = entries::ActiveModel {
            account_id: ActiveValue::Set(arg.account_id),
            amount: ActiveValue::Set(arg.amount),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;
        Ok(Entry::from(model))
    }

    async fn get_entry(&self, id: i64) -> ResultLedger<Entry> {
        entries::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .map(Entry::from)
            .ok_or_else(|| LedgerError::NotFound(format!("entry {id}")))
    }

    async fn list_entries(&self, arg: ListEntriesParams) -> ResultLedger<Vec<Entry>> {
        let models = entries::Entity::find()
            .filter(entries::Column::AccountId.eq(arg.account_id))
            .order_by_asc(entries::Column::Id)
            .limit(arg.limit)
            .offset(arg.offset)
            .all(self.conn)
            .await?;
        Ok(models.into_iter().map(Entry::from).collect())
    }

    async fn create_transfer(&self, arg: CreateTransferParams) -> ResultLedger<Transfer> {
        let model = transfers::ActiveModel {
            from_account_id: ActiveValue::Set(arg.from_account_id),
            to_account_id: ActiveValue::Set(arg.to_account_id),
            amount: ActiveValue::Set(arg.amount),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;
        Ok(Transfer::from(model))
    }

    async fn get_transfer(&self, id: i64) -> ResultLedger<Transfer> {
        transfers::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .map(Transfer::from)
            .ok_or_else(|| LedgerError::NotFound(format!("transfer {id}")))
    }

    async fn list_transfers(&self, arg: ListTransfersParams) -> ResultLedger<Vec<Transfer>> {
        let models = transfers::Entity::find()
            .filter(
                Condition::any()
                    .add(transfers::Column::FromAccountId.eq(arg.from_account_id))
                    .add(transfers::Column::ToAccountId.eq(arg.to_account_id)),
            )
            .order_by_asc(transfers::Column::Id)
            .limit(arg.limit)
            .offset(arg.offset)
            .all(self.conn)
            .await?;
        Ok(models.into_iter().map(Transfer::from).collect())
    }
}
