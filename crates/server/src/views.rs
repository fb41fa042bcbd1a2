//! Conversions from ledger records to API views.

use api_types::{
    Currency, account::AccountView, entry::EntryView, transfer::TransferResult,
    transfer::TransferView, user::UserView,
};
use ledger::{Account, Entry, Transfer, TransferTxResult, User};

pub fn map_currency(currency: ledger::Currency) -> Currency {
    match currency {
        ledger::Currency::Usd => Currency::Usd,
        ledger::Currency::Eur => Currency::Eur,
        ledger::Currency::Cad => Currency::Cad,
    }
}

pub fn ledger_currency(currency: Currency) -> ledger::Currency {
    match currency {
        Currency::Usd => ledger::Currency::Usd,
        Currency::Eur => ledger::Currency::Eur,
        Currency::Cad => ledger::Currency::Cad,
    }
}

pub fn user_view(user: User) -> UserView {
    UserView {
        username: user.username,
        full_name: user.full_name,
        email: user.email,
        password_changed_at: user.password_changed_at,
        created_at: user.created_at,
    }
}

pub fn account_view(account: Account) -> AccountView {
    AccountView {
        id: account.id,
        owner: account.owner,
        balance: account.balance,
        currency: map_currency(account.currency),
        created_at: account.created_at,
    }
}

pub fn entry_view(entry: Entry) -> EntryView {
    EntryView {
        id: entry.id,
        account_id: entry.account_id,
        amount: entry.amount,
        created_at: entry.created_at,
    }
}

pub fn transfer_view(transfer: Transfer) -> TransferView {
    TransferView {
        id: transfer.id,
        from_account_id: transfer.from_account_id,
        to_account_id: transfer.to_account_id,
        amount: transfer.amount,
        created_at: transfer.created_at,
    }
}

pub fn transfer_result(result: TransferTxResult) -> TransferResult {
    TransferResult {
        transfer: transfer_view(result.transfer),
        from_entry: entry_view(result.from_entry),
        to_entry: entry_view(result.to_entry),
        from_account: account_view(result.from_account),
        to_account: account_view(result.to_account),
    }
}

/// Validates a page request and turns it into `(limit, offset)`.
pub fn page_bounds(page: api_types::Page) -> Result<(u64, u64), crate::ServerError> {
    if page.page_id < 1 {
        return Err(crate::ServerError::Generic(
            "page_id must be at least 1".to_string(),
        ));
    }
    if !(5..=10).contains(&page.page_size) {
        return Err(crate::ServerError::Generic(
            "page_size must be between 5 and 10".to_string(),
        ));
    }
    // Offsets are bound as signed 64-bit integers.
    let offset = (page.page_id - 1)
        .checked_mul(page.page_size)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| crate::ServerError::Generic("page_id is too large".to_string()))?;
    Ok((page.page_size, offset))
}
