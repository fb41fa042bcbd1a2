//! The module contains the errors the ledger can throw.
//!
//! Database failures are classified when they cross into [`LedgerError`], so
//! callers can tell a missing row from a constraint failure from a
//! deadlock/serialization abort without inspecting driver codes:
//!
//! - [`NotFound`] a referenced row does not exist.
//! - [`ConstraintViolation`] a foreign key, unique or check constraint failed.
//! - [`TransactionAbort`] the store aborted the transaction (deadlock,
//!   serialization failure, SQLite busy). This is the only retryable kind.
//!   A PostgreSQL `lock_timeout` expiry is not one of them: it stays
//!   [`Database`].
//! - [`RollbackFailure`] the rollback after another error failed too.
//! - [`Connectivity`] the store could not be reached.
//!
//!  [`NotFound`]: LedgerError::NotFound
//!  [`ConstraintViolation`]: LedgerError::ConstraintViolation
//!  [`TransactionAbort`]: LedgerError::TransactionAbort
//!  [`RollbackFailure`]: LedgerError::RollbackFailure
//!  [`Connectivity`]: LedgerError::Connectivity
//!  [`Database`]: LedgerError::Database
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use thiserror::Error;

/// PostgreSQL and SQLite codes reported when the store gives up on a
/// transaction because of lock contention.
const ABORT_CODES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "5",     // SQLITE_BUSY
    "6",     // SQLITE_LOCKED
    "517",   // SQLITE_BUSY_SNAPSHOT
];

/// Codes for constraint failures not covered by [`SqlErr`].
const CONSTRAINT_CODES: &[&str] = &[
    "23502", // not_null_violation
    "23514", // check_violation
    "275",   // SQLITE_CONSTRAINT_CHECK
    "1299",  // SQLITE_CONSTRAINT_NOTNULL
];

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Transaction aborted: {0}")]
    TransactionAbort(String),
    #[error("{error}; rollback failed: {rollback}")]
    RollbackFailure {
        error: Box<LedgerError>,
        rollback: String,
    },
    #[error("Connectivity failure: {0}")]
    Connectivity(String),
    #[error(transparent)]
    Database(DbErr),
}

impl LedgerError {
    /// Whether the caller may run the same unit of work again.
    ///
    /// Only store-detected aborts qualify; the ledger itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionAbort(_))
    }
}

impl From<DbErr> for LedgerError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(what) => return Self::NotFound(what.clone()),
            DbErr::RecordNotUpdated => return Self::NotFound("record".to_string()),
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
                return Self::Connectivity(err.to_string());
            }
            _ => {}
        }

        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg))
            | Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                return Self::ConstraintViolation(msg);
            }
            _ => {}
        }

        if let Some(code) = database_code(&err) {
            if ABORT_CODES.contains(&code.as_str()) {
                return Self::TransactionAbort(err.to_string());
            }
            if CONSTRAINT_CODES.contains(&code.as_str()) {
                return Self::ConstraintViolation(err.to_string());
            }
        }

        if is_transport_failure(&err) {
            return Self::Connectivity(err.to_string());
        }

        Self::Database(err)
    }
}

fn sqlx_error(err: &DbErr) -> Option<&sqlx::Error> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e))
        | DbErr::Conn(RuntimeErr::SqlxError(e)) => Some(e),
        _ => None,
    }
}

fn database_code(err: &DbErr) -> Option<String> {
    sqlx_error(err)?
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned())
}

fn is_transport_failure(err: &DbErr) -> bool {
    matches!(
        sqlx_error(err),
        Some(
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        )
    )
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::ConstraintViolation(a), Self::ConstraintViolation(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::TransactionAbort(a), Self::TransactionAbort(b)) => a == b,
            (
                Self::RollbackFailure {
                    error: a,
                    rollback: ra,
                },
                Self::RollbackFailure {
                    error: b,
                    rollback: rb,
                },
            ) => a == b && ra == rb,
            (Self::Connectivity(a), Self::Connectivity(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
