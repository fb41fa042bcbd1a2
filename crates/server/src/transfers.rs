//! Transfers API endpoints

use api_types::transfer::{TransferNew, TransferResult, TransferView};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use ledger::{Account, LedgerStore, ResultLedger, TransferTxParams};
use token::Payload;

use std::{future::Future, time::Duration};

use crate::{
    ServerError,
    server::ServerState,
    views::{ledger_currency, transfer_result, transfer_view},
};

fn validate(payload: &TransferNew) -> Result<(), ServerError> {
    if payload.from_account_id < 1 || payload.to_account_id < 1 {
        return Err(ServerError::Generic(
            "account ids must be at least 1".to_string(),
        ));
    }
    if payload.amount <= 0 {
        return Err(ServerError::Generic("amount must be > 0".to_string()));
    }
    Ok(())
}

/// Loads an account and checks it holds `currency`.
async fn valid_account(
    state: &ServerState,
    id: i64,
    currency: ledger::Currency,
) -> Result<Account, ServerError> {
    let account = state.store.queries().get_account(id).await?;
    if account.currency != currency {
        return Err(ServerError::Generic(format!(
            "account [{id}] currency mismatch: {} vs {currency}",
            account.currency
        )));
    }
    Ok(account)
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or has been
/// retried `max_retries` times. The n-th retry waits `backoff * n`.
async fn retry_aborts<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    mut op: F,
) -> ResultLedger<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ResultLedger<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(attempt, "transfer aborted, retrying: {err}");
                tokio::time::sleep(backoff * attempt).await;
            }
            result => return result,
        }
    }
}

/// Bounds `fut` by `deadline`. Dropping a late transfer rolls it back.
async fn within_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = ResultLedger<T>>,
) -> Result<T, ServerError> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| ServerError::Timeout)?
        .map_err(ServerError::from)
}

/// Handle requests for moving money between two accounts
pub async fn create(
    Extension(user): Extension<Payload>,
    State(state): State<ServerState>,
    Json(payload): Json<TransferNew>,
) -> Result<(StatusCode, Json<TransferResult>), ServerError> {
    validate(&payload)?;
    let currency = ledger_currency(payload.currency);

    let from_account = valid_account(&state, payload.from_account_id, currency).await?;
    if from_account.owner != user.username {
        return Err(ServerError::Unauthorized(
            "from account doesn't belong to the authenticated user".to_string(),
        ));
    }
    valid_account(&state, payload.to_account_id, currency).await?;

    let arg = TransferTxParams {
        from_account_id: payload.from_account_id,
        to_account_id: payload.to_account_id,
        amount: payload.amount,
    };
    let config = &state.config;
    let result = within_deadline(
        config.transfer_timeout,
        retry_aborts(config.transfer_max_retries, config.transfer_retry_backoff, || {
            state.store.transfer_tx(arg)
        }),
    )
    .await?;

    tracing::debug!(
        transfer_id = result.transfer.id,
        from = arg.from_account_id,
        to = arg.to_account_id,
        "transfer committed"
    );

    Ok((StatusCode::CREATED, Json(transfer_result(result))))
}

/// Handle requests for one transfer, visible to the owner of either side
pub async fn get(
    Extension(user): Extension<Payload>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<TransferView>, ServerError> {
    let queries = state.store.queries();
    let transfer = queries.get_transfer(id).await?;

    let from = queries.get_account(transfer.from_account_id).await?;
    let to = queries.get_account(transfer.to_account_id).await?;
    if from.owner != user.username && to.owner != user.username {
        return Err(ServerError::Unauthorized(
            "transfer doesn't involve the authenticated user".to_string(),
        ));
    }

    Ok(Json(transfer_view(transfer)))
}
