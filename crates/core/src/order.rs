//! Order requests, acknowledgements and execution records.

use crate::account::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Venue environment the user's credentials are bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Testnet,
    Mainnet,
}

impl Environment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Testnet => "testnet",
            Self::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" | "test" | "sandbox" => Ok(Self::Testnet),
            "mainnet" | "live" | "production" => Ok(Self::Mainnet),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Order handed to an exchange collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub exchange: String,
    pub environment: Environment,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// `None` submits a market order
    pub price: Option<Decimal>,
    /// Client order id derived from the signal correlation id
    pub client_order_id: String,
}

/// Exchange acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub status: String,
}

/// Terminal status of one (signal, user) order attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Executed,
    Failed,
}

impl ExecutionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Executed => "EXECUTED",
            Self::Failed => "FAILED",
        }
    }
}

/// Audit record of one order attempt. Created only for directional decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExecutionRecord {
    pub id: Uuid,
    pub correlation_id: String,
    pub decision_id: Uuid,
    pub user_id: UserId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub exchange: String,
    pub environment: Environment,
    pub status: ExecutionStatus,
    pub exchange_order_id: Option<String>,
    pub attempts: u32,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Credential status reported by the key validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyStatus {
    Valid,
    Invalid,
    Pending,
}

impl KeyStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Pending => "PENDING",
        }
    }
}

impl FromStr for KeyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VALID" => Ok(Self::Valid),
            "INVALID" => Ok(Self::Invalid),
            "PENDING" => Ok(Self::Pending),
            other => Err(format!("unknown key status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeKeyValidation {
    pub user_id: UserId,
    pub exchange: String,
    pub status: KeyStatus,
    pub validated_at: Option<DateTime<Utc>>,
}

impl ExchangeKeyValidation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == KeyStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("live".parse::<Environment>(), Ok(Environment::Mainnet));
        assert_eq!("TESTNET".parse::<Environment>(), Ok(Environment::Testnet));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_key_status_parsing() {
        assert_eq!("valid".parse::<KeyStatus>(), Ok(KeyStatus::Valid));
        assert_eq!("PENDING".parse::<KeyStatus>(), Ok(KeyStatus::Pending));
        assert!("expired".parse::<KeyStatus>().is_err());
    }
}
