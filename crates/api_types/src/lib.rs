use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Cad,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub message: String,
}

/// 1-based page selection used by list endpoints.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Page {
    pub page_id: u64,
    /// Between 5 and 10 items.
    pub page_size: u64,
}

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserNew {
        /// Letters, digits and `_` only.
        pub username: String,
        /// At least 6 characters.
        pub password: String,
        pub full_name: String,
        pub email: String,
    }

    /// A user as returned by the API; the password hash never leaves the
    /// server.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub username: String,
        pub full_name: String,
        pub email: String,
        pub password_changed_at: DateTime<Utc>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginRequest {
        pub username: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginResponse {
        /// Bearer token for the `Authorization` header.
        pub access_token: String,
        pub access_token_expires_at: DateTime<Utc>,
        pub user: UserView,
    }
}

pub mod account {
    use super::*;

    /// The owner is taken from the access token.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub currency: Currency,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: i64,
        pub owner: String,
        /// Minor units.
        pub balance: i64,
        pub currency: Currency,
        pub created_at: DateTime<Utc>,
    }
}

pub mod entry {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct EntryView {
        pub id: i64,
        pub account_id: i64,
        /// Negative for debits, positive for credits.
        pub amount: i64,
        pub created_at: DateTime<Utc>,
    }
}

pub mod transfer {
    use super::*;

    use super::{account::AccountView, entry::EntryView};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferNew {
        pub from_account_id: i64,
        pub to_account_id: i64,
        /// Minor units, must be > 0.
        pub amount: i64,
        /// Both accounts must hold this currency.
        pub currency: Currency,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransferView {
        pub id: i64,
        pub from_account_id: i64,
        pub to_account_id: i64,
        pub amount: i64,
        pub created_at: DateTime<Utc>,
    }

    /// Everything a completed transfer produced, source side first.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferResult {
        pub transfer: TransferView,
        pub from_entry: EntryView,
        pub to_entry: EntryView,
        pub from_account: AccountView,
        pub to_account: AccountView,
    }
}
