use crate::account::{BalanceAccount, LedgerEntry, User, UserId};
use crate::decision::{Direction, DirectionDecision};
use crate::error::{ServiceError, StoreError};
use crate::market::{MarketPulseSnapshot, SentimentReading};
use crate::order::{Environment, ExchangeKeyValidation, OrderAck, OrderExecutionRecord, OrderRequest};
use crate::signal::TradingSignal;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fetch_sentiment(&self) -> Result<SentimentReading, ServiceError>;
    fn name(&self) -> &str;
}

#[async_trait]
pub trait PulseSource: Send + Sync {
    async fn fetch_pulse(&self) -> Result<MarketPulseSnapshot, ServiceError>;
    fn name(&self) -> &str;
}

/// Inputs handed to the AI classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationContext {
    pub symbol: String,
    pub sentiment: SentimentReading,
    pub pulse: MarketPulseSnapshot,
}

/// Raw classifier verdict, before confidence gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub direction: Direction,
    /// 0..=100
    pub confidence: f64,
    pub reasoning: String,
}

#[async_trait]
pub trait AiClassifier: Send + Sync {
    async fn classify(&self, context: &ClassificationContext)
        -> Result<Classification, ServiceError>;
    fn name(&self) -> &str;
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ServiceError>;

    /// Last traded price, used for sizing when the signal carries none.
    async fn last_price(
        &self,
        exchange: &str,
        environment: Environment,
        symbol: &str,
    ) -> Result<Decimal, ServiceError>;
}

#[async_trait]
pub trait KeyValidator: Send + Sync {
    async fn validate(
        &self,
        user_id: UserId,
        exchange: &str,
    ) -> Result<ExchangeKeyValidation, ServiceError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn active_users(&self) -> Result<Vec<User>, StoreError>;
}

#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn load(&self, user_id: UserId) -> Result<Option<BalanceAccount>, StoreError>;

    /// Persists the account and its ledger entries atomically.
    async fn commit(
        &self,
        account: &BalanceAccount,
        entries: &[LedgerEntry],
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record_execution(&self, record: &OrderExecutionRecord) -> Result<(), StoreError>;
}

/// Result of claiming a correlation id for a new decision cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// Caller owns the cycle and must `complete` or `release` it.
    Claimed,
    /// A decision already exists for this correlation id.
    Existing(Box<DirectionDecision>),
    /// Another worker is deciding this correlation id right now.
    InFlight,
}

/// Append-only decision log keyed by correlation id.
#[async_trait]
pub trait DecisionLog: Send + Sync {
    async fn claim(&self, correlation_id: &str) -> Result<Claim, StoreError>;

    async fn complete(
        &self,
        signal: &TradingSignal,
        decision: &DirectionDecision,
    ) -> Result<(), StoreError>;

    /// Drops an unfinished claim so a re-delivery can retry.
    async fn release(&self, correlation_id: &str) -> Result<(), StoreError>;

    async fn get(&self, correlation_id: &str) -> Result<Option<DirectionDecision>, StoreError>;
}
