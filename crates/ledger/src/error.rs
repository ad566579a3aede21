use pulse_trade_core::{BalanceType, StoreError, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("invalid balance type: {0}")]
    InvalidBalanceType(String),

    #[error("insufficient {balance_type}: available {available}, requested {requested}")]
    InsufficientBalance {
        balance_type: BalanceType,
        available: Decimal,
        requested: Decimal,
    },

    #[error("invalid conversion: {0}")]
    InvalidConversion(String),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("no balance account for user {0}")]
    AccountNotFound(UserId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BalanceError {
    /// True when the balance store itself is unusable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_fatal())
    }
}
