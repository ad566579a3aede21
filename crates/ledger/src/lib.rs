//! Balance Manager: typed per-user balances, guarded adjustments and
//! commission conversion.

pub mod error;
pub mod manager;

pub use error::BalanceError;
pub use manager::{
    can_convert, can_withdraw, BalanceManager, BalanceOp, ConversionReceipt, CONVERSION_BONUS,
};
