//! Access tokens and password hashing.
//!
//! The API layer issues a token at login and verifies it on every protected
//! request; the ledger only ever sees the `username` the token carries.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use jwt::JwtMaker;
pub use password::{hash_password, verify_password};

mod jwt;
mod password;

/// Shortest accepted symmetric key.
pub const MIN_SECRET_KEY_SIZE: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid key size: must be at least {MIN_SECRET_KEY_SIZE} characters")]
    InvalidKeySize,
    #[error("token is invalid")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("token encoding failed: {0}")]
    Encoding(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Claims carried by an access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub id: Uuid,
    pub username: String,
    /// Issued at, seconds since the epoch.
    pub iat: i64,
    /// Expires at, seconds since the epoch.
    pub exp: i64,
}

impl Payload {
    pub fn new(username: &str, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + duration).timestamp(),
        }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0).single().unwrap_or_default()
    }

    pub fn expired_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_default()
    }
}

/// Issues and checks access tokens.
pub trait Maker: Send + Sync {
    /// Creates a token for `username` valid for `duration`.
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError>;

    /// Returns the payload of a well-formed, unexpired token.
    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}
