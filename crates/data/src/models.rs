//! Row types for the `PostgreSQL` tables.

use chrono::{DateTime, Utc};
use pulse_trade_core::{
    BalanceAccount, Environment, ExchangeKeyValidation, KeyStatus, StoreError, User,
};
use rust_decimal::Decimal;

use crate::database::corrupt;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub active: bool,
    pub exchange: String,
    pub environment: String,
    pub credentials_ref: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let environment: Environment = row
            .environment
            .parse()
            .map_err(|e| corrupt("users.environment", e))?;
        Ok(Self {
            id: row.id,
            active: row.active,
            exchange: row.exchange,
            environment,
            credentials_ref: row.credentials_ref,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BalanceRow {
    pub user_id: i64,
    pub real_brl: Decimal,
    pub real_usd: Decimal,
    pub admin_brl: Decimal,
    pub admin_usd: Decimal,
    pub commission_brl: Decimal,
    pub commission_usd: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<BalanceRow> for BalanceAccount {
    fn from(row: BalanceRow) -> Self {
        Self {
            user_id: row.user_id,
            real_brl: row.real_brl,
            real_usd: row.real_usd,
            admin_brl: row.admin_brl,
            admin_usd: row.admin_usd,
            commission_brl: row.commission_brl,
            commission_usd: row.commission_usd,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeyValidationRow {
    pub user_id: i64,
    pub exchange: String,
    pub status: String,
    pub validated_at: Option<DateTime<Utc>>,
}

impl TryFrom<KeyValidationRow> for ExchangeKeyValidation {
    type Error = StoreError;

    fn try_from(row: KeyValidationRow) -> Result<Self, Self::Error> {
        let status: KeyStatus = row
            .status
            .parse()
            .map_err(|e| corrupt("exchange_key_validations.status", e))?;
        Ok(Self {
            user_id: row.user_id,
            exchange: row.exchange,
            status,
            validated_at: row.validated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_row_conversion() {
        let row = UserRow {
            id: 3,
            active: true,
            exchange: "binance".to_string(),
            environment: "mainnet".to_string(),
            credentials_ref: "vault:3".to_string(),
        };
        let user = User::try_from(row).unwrap();
        assert_eq!(user.environment, Environment::Mainnet);
    }

    #[test]
    fn test_bad_enum_text_is_corrupt() {
        let row = KeyValidationRow {
            user_id: 1,
            exchange: "binance".to_string(),
            status: "EXPIRED".to_string(),
            validated_at: None,
        };
        assert!(matches!(
            ExchangeKeyValidation::try_from(row),
            Err(StoreError::Corrupt(_))
        ));
    }
}
