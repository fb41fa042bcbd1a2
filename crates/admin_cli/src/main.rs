use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal,
};
use ledger::{CreateAccountParams, CreateUserParams, Currency, LedgerError, LedgerStore, Store};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "bank_admin")]
#[command(about = "Admin utilities for bank (migrations, bootstrap users/accounts)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./bank.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply every pending migration.
    Migrate,
    User(User),
    Account(Account),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    /// Open an account with a zero balance.
    Create(AccountCreateArgs),
    Show(AccountShowArgs),
}

#[derive(Args, Debug)]
struct AccountCreateArgs {
    #[arg(long)]
    owner: String,
    #[arg(long, default_value = "USD")]
    currency: String,
}

#[derive(Args, Debug)]
struct AccountShowArgs {
    #[arg(long)]
    id: i64,
}

/// Reads one line from the terminal without echoing it.
fn read_hidden(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    terminal::enable_raw_mode()?;
    let line = read_keys();
    terminal::disable_raw_mode()?;
    eprintln!();
    line
}

fn read_keys() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut line = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(line),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err("interrupted".into());
            }
            KeyCode::Backspace => {
                line.pop();
            }
            KeyCode::Char(ch) => line.push(ch),
            _ => {}
        }
    }
}

/// Asks twice for a password of at least 6 characters.
fn prompt_new_password() -> Result<String, Box<dyn Error + Send + Sync>> {
    for _ in 0..3 {
        let password = read_hidden("Password: ")?;
        if password.chars().count() < 6 {
            eprintln!("Password must be at least 6 characters.");
            continue;
        }
        if read_hidden("Confirm password: ")? == password {
            return Ok(password);
        }
        eprintln!("Passwords do not match. Try again.");
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let store = Store::builder().database(db).build().await?;
    let queries = store.queries();

    match cli.command {
        Command::Migrate => {
            println!("database is up to date");
        }
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            if queries.get_user(&args.username).await.is_ok() {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }

            let password = prompt_new_password()?;
            let user = queries
                .create_user(CreateUserParams {
                    username: args.username,
                    hashed_password: token::hash_password(&password)?,
                    full_name: args.full_name,
                    email: args.email,
                })
                .await?;

            println!("created user: {}", user.username);
        }
        Command::Account(Account {
            command: AccountCommand::Create(args),
        }) => {
            if let Err(LedgerError::NotFound(_)) = queries.get_user(&args.owner).await {
                eprintln!("user not found: {}", args.owner);
                std::process::exit(1);
            }

            let currency = match Currency::try_from(args.currency.as_str()) {
                Ok(v) => v,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            };

            let account = queries
                .create_account(CreateAccountParams {
                    owner: args.owner,
                    balance: 0,
                    currency,
                })
                .await?;
            println!("created account: {} ({currency})", account.id);
        }
        Command::Account(Account {
            command: AccountCommand::Show(args),
        }) => match queries.get_account(args.id).await {
            Ok(account) => println!(
                "account {}: owner={} balance={} {}",
                account.id, account.owner, account.balance, account.currency
            ),
            Err(LedgerError::NotFound(_)) => {
                eprintln!("account not found: {}", args.id);
                std::process::exit(1);
            }
            Err(err) => return Err(err.into()),
        },
    }

    Ok(())
}
