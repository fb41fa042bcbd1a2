//! The module contains `Account` and its database entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Currency, LedgerError};

/// A balance-holding account.
///
/// `balance` is expressed in minor units of `currency` and is only ever
/// changed by a transfer, inside the same database transaction that appends the
/// matching entry. It may be negative: the ledger does not enforce overdraft
/// limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entries::Entity")]
    Entries,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::Owner",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Account {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            owner: model.owner,
            balance: model.balance,
            currency: Currency::try_from(model.currency.as_str())?,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(currency: &str) -> Model {
        Model {
            id: 1,
            owner: "alice".to_string(),
            balance: 100,
            currency: currency.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn converts_model_with_known_currency() {
        let account = Account::try_from(model("EUR")).unwrap();
        assert_eq!(account.currency, Currency::Eur);
        assert_eq!(account.balance, 100);
    }

    #[test]
    fn rejects_model_with_unknown_currency() {
        let err = Account::try_from(model("XYZ")).unwrap_err();
        assert!(matches!(err, LedgerError::CurrencyMismatch(_)));
    }
}
