//! Users and their typed balance accounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::order::Environment;

pub type UserId = i64;

/// A subscriber whose exchange account receives fanned-out orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub active: bool,
    /// Exchange the user's credentials belong to, e.g. "binance"
    pub exchange: String,
    pub environment: Environment,
    /// Opaque handle into the external credential store
    pub credentials_ref: String,
}

/// Settlement currency of a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Brl,
    Usd,
}

impl Currency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brl => "BRL",
            Self::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BRL" => Ok(Self::Brl),
            "USD" => Ok(Self::Usd),
            other => Err(format!("unknown currency: {other}")),
        }
    }
}

/// Withdrawal/conversion class of a balance type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceClass {
    Withdrawable,
    NonWithdrawable,
    Convertible,
}

/// The six named balances every account carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceType {
    #[serde(rename = "real_BRL")]
    RealBrl,
    #[serde(rename = "real_USD")]
    RealUsd,
    #[serde(rename = "admin_BRL")]
    AdminBrl,
    #[serde(rename = "admin_USD")]
    AdminUsd,
    #[serde(rename = "commission_BRL")]
    CommissionBrl,
    #[serde(rename = "commission_USD")]
    CommissionUsd,
}

impl BalanceType {
    pub const ALL: [Self; 6] = [
        Self::RealBrl,
        Self::RealUsd,
        Self::AdminBrl,
        Self::AdminUsd,
        Self::CommissionBrl,
        Self::CommissionUsd,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RealBrl => "real_BRL",
            Self::RealUsd => "real_USD",
            Self::AdminBrl => "admin_BRL",
            Self::AdminUsd => "admin_USD",
            Self::CommissionBrl => "commission_BRL",
            Self::CommissionUsd => "commission_USD",
        }
    }

    #[must_use]
    pub const fn class(self) -> BalanceClass {
        match self {
            Self::RealBrl | Self::RealUsd => BalanceClass::Withdrawable,
            Self::AdminBrl | Self::AdminUsd => BalanceClass::NonWithdrawable,
            Self::CommissionBrl | Self::CommissionUsd => BalanceClass::Convertible,
        }
    }

    #[must_use]
    pub const fn currency(self) -> Currency {
        match self {
            Self::RealBrl | Self::AdminBrl | Self::CommissionBrl => Currency::Brl,
            Self::RealUsd | Self::AdminUsd | Self::CommissionUsd => Currency::Usd,
        }
    }

    /// Withdrawable balance in `currency`.
    #[must_use]
    pub const fn real(currency: Currency) -> Self {
        match currency {
            Currency::Brl => Self::RealBrl,
            Currency::Usd => Self::RealUsd,
        }
    }

    /// Admin-credited balance in `currency`.
    #[must_use]
    pub const fn admin(currency: Currency) -> Self {
        match currency {
            Currency::Brl => Self::AdminBrl,
            Currency::Usd => Self::AdminUsd,
        }
    }

    /// Commission balance in `currency`.
    #[must_use]
    pub const fn commission(currency: Currency) -> Self {
        match currency {
            Currency::Brl => Self::CommissionBrl,
            Currency::Usd => Self::CommissionUsd,
        }
    }
}

impl fmt::Display for BalanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BalanceType {
    type Err = String;

    /// Accepts the canonical names case-insensitively (`real_BRL`, `REAL_brl`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| wanted.to_string())
    }
}

/// Per-user typed balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAccount {
    pub user_id: UserId,
    pub real_brl: Decimal,
    pub real_usd: Decimal,
    pub admin_brl: Decimal,
    pub admin_usd: Decimal,
    pub commission_brl: Decimal,
    pub commission_usd: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl BalanceAccount {
    /// Empty account for a new user.
    #[must_use]
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            real_brl: Decimal::ZERO,
            real_usd: Decimal::ZERO,
            admin_brl: Decimal::ZERO,
            admin_usd: Decimal::ZERO,
            commission_brl: Decimal::ZERO,
            commission_usd: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn get(&self, balance_type: BalanceType) -> Decimal {
        match balance_type {
            BalanceType::RealBrl => self.real_brl,
            BalanceType::RealUsd => self.real_usd,
            BalanceType::AdminBrl => self.admin_brl,
            BalanceType::AdminUsd => self.admin_usd,
            BalanceType::CommissionBrl => self.commission_brl,
            BalanceType::CommissionUsd => self.commission_usd,
        }
    }

    pub fn set(&mut self, balance_type: BalanceType, value: Decimal) {
        let slot = match balance_type {
            BalanceType::RealBrl => &mut self.real_brl,
            BalanceType::RealUsd => &mut self.real_usd,
            BalanceType::AdminBrl => &mut self.admin_brl,
            BalanceType::AdminUsd => &mut self.admin_usd,
            BalanceType::CommissionBrl => &mut self.commission_brl,
            BalanceType::CommissionUsd => &mut self.commission_usd,
        };
        *slot = value;
    }

    /// Funds usable as trading collateral: withdrawable plus non-withdrawable
    /// balance of `currency`. Negative components (credit lines) count as zero.
    #[must_use]
    pub fn available_for_trading(&self, currency: Currency) -> Decimal {
        let real = self.get(BalanceType::real(currency)).max(Decimal::ZERO);
        let admin = self.get(BalanceType::admin(currency)).max(Decimal::ZERO);
        real + admin
    }

    /// Sum of WITHDRAWABLE balances in `currency`.
    #[must_use]
    pub fn total_withdrawable(&self, currency: Currency) -> Decimal {
        BalanceType::ALL
            .iter()
            .filter(|t| t.class() == BalanceClass::Withdrawable && t.currency() == currency)
            .map(|t| self.get(*t))
            .sum()
    }
}

/// Kind of ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerOp {
    Add,
    Subtract,
    ConvertOut,
    ConvertIn,
}

impl LedgerOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Subtract => "SUBTRACT",
            Self::ConvertOut => "CONVERT_OUT",
            Self::ConvertIn => "CONVERT_IN",
        }
    }
}

/// Append-only record of one balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub balance_type: BalanceType,
    pub op: LedgerOp,
    pub amount: Decimal,
    pub before: Decimal,
    pub after: Decimal,
    /// Free-form reference (conversion id, admin note)
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
