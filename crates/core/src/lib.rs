pub mod account;
pub mod config;
pub mod config_loader;
pub mod decision;
pub mod error;
pub mod market;
pub mod order;
pub mod position_sizing;
pub mod retry;
pub mod scheduler;
pub mod signal;
pub mod traits;

pub use account::{
    BalanceAccount, BalanceClass, BalanceType, Currency, LedgerEntry, LedgerOp, User, UserId,
};
pub use config::{
    AppConfig, ArbiterConfig, BalanceConfig, ConfigError, CycleConfig, DatabaseConfig,
    ExecutorConfig, SelectorConfig, SentimentConfig, ServerConfig,
};
pub use config_loader::ConfigLoader;
pub use decision::{DecidedBy, DecisionDraft, Direction, DirectionDecision};
pub use error::{ServiceError, StoreError};
pub use market::{MarketPulseSnapshot, SentimentClass, SentimentReading};
pub use order::{
    Environment, ExchangeKeyValidation, ExecutionStatus, KeyStatus, OrderAck,
    OrderExecutionRecord, OrderRequest, OrderSide,
};
pub use position_sizing::{calculate_order_quantity, SizingParams, SizingRejection};
pub use retry::{RetryOutcome, RetryPolicy};
pub use scheduler::ScheduledTask;
pub use signal::{SignalPayload, SignalValidationError, TradingSignal};
pub use traits::{
    AiClassifier, AuditLog, BalanceStore, Claim, Classification, ClassificationContext,
    DecisionLog, ExchangeClient, KeyValidator, PulseSource, SentimentSource, UserDirectory,
};
