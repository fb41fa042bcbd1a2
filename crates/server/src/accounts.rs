//! Accounts API endpoints

use api_types::{
    Page,
    account::{AccountNew, AccountView},
    entry::EntryView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ledger::{Account, CreateAccountParams, LedgerStore, ListAccountsParams, ListEntriesParams};
use token::Payload;

use crate::{
    ServerError,
    server::ServerState,
    views::{account_view, entry_view, ledger_currency, page_bounds},
};

/// Loads an account and checks it belongs to the caller.
async fn owned_account(
    state: &ServerState,
    id: i64,
    user: &Payload,
) -> Result<Account, ServerError> {
    let account = state.store.queries().get_account(id).await?;
    if account.owner != user.username {
        return Err(ServerError::Unauthorized(
            "account doesn't belong to the authenticated user".to_string(),
        ));
    }
    Ok(account)
}

/// Handle requests for opening an account with a zero balance
pub async fn create(
    Extension(user): Extension<Payload>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountView>), ServerError> {
    let account = state
        .store
        .queries()
        .create_account(CreateAccountParams {
            owner: user.username,
            balance: 0,
            currency: ledger_currency(payload.currency),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(account_view(account))))
}

pub async fn get(
    Extension(user): Extension<Payload>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<AccountView>, ServerError> {
    let account = owned_account(&state, id, &user).await?;
    Ok(Json(account_view(account)))
}

/// Handle requests for listing the caller's accounts
pub async fn list(
    Extension(user): Extension<Payload>,
    State(state): State<ServerState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<AccountView>>, ServerError> {
    let (limit, offset) = page_bounds(page)?;
    let accounts = state
        .store
        .queries()
        .list_accounts(ListAccountsParams {
            owner: user.username,
            limit,
            offset,
        })
        .await?;

    Ok(Json(accounts.into_iter().map(account_view).collect()))
}

pub async fn delete(
    Extension(user): Extension<Payload>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    owned_account(&state, id, &user).await?;
    state.store.queries().delete_account(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handle requests for the movement history of one account
pub async fn entries(
    Extension(user): Extension<Payload>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<EntryView>>, ServerError> {
    let (limit, offset) = page_bounds(page)?;
    owned_account(&state, id, &user).await?;
    let entries = state
        .store
        .queries()
        .list_entries(ListEntriesParams {
            account_id: id,
            limit,
            offset,
        })
        .await?;

    Ok(Json(entries.into_iter().map(entry_view).collect()))
}
