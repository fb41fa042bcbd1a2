#![allow(dead_code)]

use ledger::{
    Account, CreateAccountParams, CreateUserParams, Currency, LedgerStore, Store, User,
};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database};
use tokio::sync::OnceCell;
use uuid::Uuid;

static PG_MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Fresh in-memory database with the full schema.
///
/// A single pooled connection keeps every task on the same in-memory database.
pub async fn store_with_db() -> Store {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Store::builder().database(db).build().await.unwrap()
}

/// Store on the PostgreSQL database named by `DATABASE_URL`, or `None` when
/// the variable is unset or not a PostgreSQL URL.
///
/// Every caller gets its own pool sized for real concurrency. The schema is
/// migrated once per test binary; tests keep to random users and accounts so
/// they can share the database.
pub async fn pg_store() -> Option<Store> {
    let url = std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with("postgres"))?;

    PG_MIGRATED
        .get_or_init(|| async {
            let db = Database::connect(url.as_str()).await.unwrap();
            migration::Migrator::up(&db, None).await.unwrap();
            db.close().await.unwrap();
        })
        .await;

    let mut opt = ConnectOptions::new(url);
    opt.max_connections(20).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    Some(Store::builder().database(db).build().await.unwrap())
}

pub async fn create_random_user(store: &Store) -> User {
    let username = format!("user_{}", &Uuid::new_v4().simple().to_string()[..12]);
    store
        .queries()
        .create_user(CreateUserParams {
            email: format!("{username}@email.com"),
            full_name: format!("Test {username}"),
            hashed_password: "secret-hash".to_string(),
            username,
        })
        .await
        .unwrap()
}

pub async fn create_account(store: &Store, owner: &str, balance: i64, currency: Currency) -> Account {
    store
        .queries()
        .create_account(CreateAccountParams {
            owner: owner.to_string(),
            balance,
            currency,
        })
        .await
        .unwrap()
}

pub async fn create_random_account(store: &Store, balance: i64) -> Account {
    let user = create_random_user(store).await;
    create_account(store, &user.username, balance, Currency::Usd).await
}
