use api_types::ErrorResponse;
use axum::{Json, http::StatusCode, response::IntoResponse};
use ledger::LedgerError;
use token::TokenError;

pub use server::{ServerConfig, ServerState, router, run_with_listener};

mod accounts;
mod server;
mod transfers;
mod users;
mod views;

#[derive(Debug)]
pub enum ServerError {
    Ledger(LedgerError),
    Token(TokenError),
    /// The caller is not allowed to see or touch the resource.
    Unauthorized(String),
    /// The transfer did not finish before the configured deadline.
    Timeout,
    /// Request validation failure.
    Generic(String),
}

fn status_for_ledger_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::ConstraintViolation(_)
        | LedgerError::InvalidAmount(_)
        | LedgerError::CurrencyMismatch(_) => StatusCode::BAD_REQUEST,
        LedgerError::TransactionAbort(_)
        | LedgerError::RollbackFailure { .. }
        | LedgerError::Connectivity(_)
        | LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_ledger_error(err: LedgerError) -> String {
    if status_for_ledger_error(&err).is_server_error() {
        tracing::error!("ledger error: {err}");
        "internal server error".to_string()
    } else {
        err.to_string()
    }
}

fn status_for_token_error(err: &TokenError) -> StatusCode {
    match err {
        TokenError::Invalid | TokenError::Expired => StatusCode::UNAUTHORIZED,
        TokenError::InvalidKeySize | TokenError::Encoding(_) | TokenError::Hashing(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Ledger(err) => (status_for_ledger_error(&err), message_for_ledger_error(err)),
            ServerError::Token(err) => {
                let status = status_for_token_error(&err);
                if status.is_server_error() {
                    tracing::error!("token error: {err}");
                }
                (status, err.to_string())
            }
            ServerError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err),
            ServerError::Timeout => {
                tracing::error!("transfer deadline exceeded");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "transfer timed out".to_string(),
                )
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<LedgerError> for ServerError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<TokenError> for ServerError {
    fn from(value: TokenError) -> Self {
        Self::Token(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_not_found_maps_to_404() {
        let res = ServerError::from(LedgerError::NotFound("account 1".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn ledger_validation_maps_to_400() {
        for err in [
            LedgerError::ConstraintViolation("fk".to_string()),
            LedgerError::InvalidAmount("x".to_string()),
            LedgerError::CurrencyMismatch("x".to_string()),
        ] {
            assert_eq!(ServerError::from(err).into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn ledger_abort_maps_to_500() {
        let res =
            ServerError::from(LedgerError::TransactionAbort("deadlock".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_token_maps_to_401() {
        let res = ServerError::from(TokenError::Expired).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = ServerError::from(TokenError::Invalid).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let res = ServerError::Unauthorized("not yours".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn timeout_maps_to_503() {
        assert_eq!(
            ServerError::Timeout.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
