use crate::error::BalanceError;
use chrono::Utc;
use parking_lot::Mutex;
use pulse_trade_core::{
    BalanceAccount, BalanceClass, BalanceConfig, BalanceStore, BalanceType, Currency,
    LedgerEntry, LedgerOp, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Credited = debited × 1.10
pub const CONVERSION_BONUS: Decimal = Decimal::from_parts(110, 0, 0, false, 2);

/// Direction of a manual balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BalanceOp {
    Add,
    Subtract,
}

impl fmt::Display for BalanceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("ADD"),
            Self::Subtract => f.write_str("SUBTRACT"),
        }
    }
}

impl FromStr for BalanceOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADD" | "CREDIT" => Ok(Self::Add),
            "SUBTRACT" | "SUB" | "DEBIT" => Ok(Self::Subtract),
            other => Err(format!("unknown balance operation: {other}")),
        }
    }
}

/// Outcome of a commission conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReceipt {
    pub reference: String,
    pub from: BalanceType,
    pub to: BalanceType,
    pub debited: Decimal,
    pub credited: Decimal,
    pub account: BalanceAccount,
}

/// True for WITHDRAWABLE balance types.
#[must_use]
pub fn can_withdraw(balance_type: BalanceType) -> bool {
    balance_type.class() == BalanceClass::Withdrawable
}

/// True for CONVERTIBLE balance types.
#[must_use]
pub fn can_convert(balance_type: BalanceType) -> bool {
    balance_type.class() == BalanceClass::Convertible
}

fn parse_type(name: &str) -> Result<BalanceType, BalanceError> {
    name.parse()
        .map_err(|_| BalanceError::InvalidBalanceType(name.to_string()))
}

/// Owns every mutation of user balances.
///
/// Read-modify-write cycles for one user are serialized by a per-user async
/// mutex; the store then commits the account and its ledger entries in one
/// transaction.
pub struct BalanceManager {
    store: Arc<dyn BalanceStore>,
    config: BalanceConfig,
    user_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl BalanceManager {
    #[must_use]
    pub fn new(store: Arc<dyn BalanceStore>, config: BalanceConfig) -> Self {
        Self {
            store,
            config,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, user_id: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock();
        // Entries only the map references are idle
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(user_id).or_default())
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.user_locks.lock().len()
    }

    /// # Errors
    /// `AccountNotFound` for unknown users, `Store` on persistence failure.
    pub async fn get_balance(&self, user_id: UserId) -> Result<BalanceAccount, BalanceError> {
        self.store
            .load(user_id)
            .await?
            .ok_or(BalanceError::AccountNotFound(user_id))
    }

    /// Adjusts one balance by name (`real_BRL`, `admin_USD`, ...).
    ///
    /// # Errors
    /// `InvalidBalanceType` for unknown names, plus everything [`Self::apply`] returns.
    pub async fn update_balance(
        &self,
        user_id: UserId,
        balance_type: &str,
        amount: Decimal,
        op: BalanceOp,
    ) -> Result<BalanceAccount, BalanceError> {
        let balance_type = parse_type(balance_type)?;
        self.apply(user_id, balance_type, amount, op, None).await
    }

    /// Adjusts one balance.
    ///
    /// An ADD on a user without an account opens one.
    ///
    /// # Errors
    /// - `InvalidAmount` unless `amount > 0`
    /// - `InsufficientBalance` if a SUBTRACT would leave a WITHDRAWABLE or
    ///   CONVERTIBLE balance negative, or a NON_WITHDRAWABLE one negative
    ///   while credit is disabled
    /// - `AccountNotFound` on SUBTRACT for an unknown user
    pub async fn apply(
        &self,
        user_id: UserId,
        balance_type: BalanceType,
        amount: Decimal,
        op: BalanceOp,
        reference: Option<String>,
    ) -> Result<BalanceAccount, BalanceError> {
        if amount <= Decimal::ZERO {
            return Err(BalanceError::InvalidAmount(amount));
        }

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut account = match (self.store.load(user_id).await?, op) {
            (Some(account), _) => account,
            (None, BalanceOp::Add) => BalanceAccount::empty(user_id),
            (None, BalanceOp::Subtract) => return Err(BalanceError::AccountNotFound(user_id)),
        };

        let before = account.get(balance_type);
        let after = match op {
            BalanceOp::Add => before + amount,
            BalanceOp::Subtract => before - amount,
        };

        if after < Decimal::ZERO && !self.may_go_negative(balance_type) {
            return Err(BalanceError::InsufficientBalance {
                balance_type,
                available: before,
                requested: amount,
            });
        }

        let now = Utc::now();
        account.set(balance_type, after);
        account.updated_at = now;

        let entry = LedgerEntry {
            user_id,
            balance_type,
            op: match op {
                BalanceOp::Add => LedgerOp::Add,
                BalanceOp::Subtract => LedgerOp::Subtract,
            },
            amount,
            before,
            after,
            reference,
            recorded_at: now,
        };

        self.store.commit(&account, &[entry]).await?;
        tracing::info!(
            "Balance {} {} {} for user {}: {} -> {}",
            op,
            amount,
            balance_type,
            user_id,
            before,
            after
        );
        Ok(account)
    }

    /// Converts commission in `currency` into the matching real balance with
    /// the 10% bonus.
    ///
    /// # Errors
    /// `InvalidConversion` if `amount` exceeds the commission balance.
    pub async fn convert_commission(
        &self,
        user_id: UserId,
        amount: Decimal,
        currency: Currency,
    ) -> Result<ConversionReceipt, BalanceError> {
        self.convert_typed(user_id, BalanceType::commission(currency), amount)
            .await
    }

    /// Converts a balance by name. Only CONVERTIBLE types are accepted.
    ///
    /// # Errors
    /// `InvalidBalanceType` for unknown names, `InvalidConversion` for
    /// non-convertible types or amounts above the balance.
    pub async fn convert(
        &self,
        user_id: UserId,
        balance_type: &str,
        amount: Decimal,
    ) -> Result<ConversionReceipt, BalanceError> {
        let balance_type = parse_type(balance_type)?;
        self.convert_typed(user_id, balance_type, amount).await
    }

    async fn convert_typed(
        &self,
        user_id: UserId,
        from: BalanceType,
        amount: Decimal,
    ) -> Result<ConversionReceipt, BalanceError> {
        if !can_convert(from) {
            return Err(BalanceError::InvalidConversion(format!(
                "{from} is not a convertible balance"
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(BalanceError::InvalidAmount(amount));
        }

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut account = self
            .store
            .load(user_id)
            .await?
            .ok_or(BalanceError::AccountNotFound(user_id))?;

        let available = account.get(from);
        if amount > available {
            return Err(BalanceError::InvalidConversion(format!(
                "requested {amount} exceeds {from} balance {available}"
            )));
        }

        let to = BalanceType::real(from.currency());
        let credited = amount * CONVERSION_BONUS;
        let to_before = account.get(to);
        let now = Utc::now();
        let reference = format!("conv-{}", Uuid::new_v4());

        account.set(from, available - amount);
        account.set(to, to_before + credited);
        account.updated_at = now;

        let entries = [
            LedgerEntry {
                user_id,
                balance_type: from,
                op: LedgerOp::ConvertOut,
                amount,
                before: available,
                after: available - amount,
                reference: Some(reference.clone()),
                recorded_at: now,
            },
            LedgerEntry {
                user_id,
                balance_type: to,
                op: LedgerOp::ConvertIn,
                amount: credited,
                before: to_before,
                after: to_before + credited,
                reference: Some(reference.clone()),
                recorded_at: now,
            },
        ];

        self.store.commit(&account, &entries).await?;
        tracing::info!(
            "Converted {} {} -> {} {} for user {} ({})",
            amount,
            from,
            credited,
            to,
            user_id,
            reference
        );

        Ok(ConversionReceipt {
            reference,
            from,
            to,
            debited: amount,
            credited,
            account,
        })
    }

    fn may_go_negative(&self, balance_type: BalanceType) -> bool {
        balance_type.class() == BalanceClass::NonWithdrawable
            && self.config.allow_non_withdrawable_credit
    }
}
