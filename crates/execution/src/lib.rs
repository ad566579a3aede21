//! Multi-user fan-out executor.
//!
//! Provides:
//! - [`FanoutExecutor`]: bounded-concurrency per-user order attempts
//! - [`ExecutionLocks`]: non-blocking per-(user, symbol) serialization
//! - [`BatchReport`]: per-user outcomes plus aggregate counts
//! - Exchange clients: [`PaperExchange`] and [`HttpOrderGateway`]
//! - [`CachedKeyValidator`]: TTL cache over a key validator

pub mod fanout;
pub mod gateway;
pub mod key_cache;
pub mod locks;
pub mod paper;
pub mod report;

pub use fanout::{ExecutorDeps, ExecutorError, FanoutExecutor};
pub use gateway::HttpOrderGateway;
pub use key_cache::CachedKeyValidator;
pub use locks::{ExecutionGuard, ExecutionLocks};
pub use paper::PaperExchange;
pub use report::{BatchCounts, BatchReport, OutcomeStatus, SkipReason, UserOutcome};

use pulse_trade_core::{ExchangeClient, ExecutorConfig, ServiceError};
use std::sync::Arc;
use std::time::Duration;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP gateway when `gateway_url` is set, paper trading otherwise.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built.
pub fn exchange_from_config(config: &ExecutorConfig) -> Result<Arc<dyn ExchangeClient>, ServiceError> {
    match &config.gateway_url {
        Some(url) => {
            tracing::info!("Routing orders through gateway {}", url);
            Ok(Arc::new(HttpOrderGateway::new(url.clone(), GATEWAY_TIMEOUT)?))
        }
        None => {
            tracing::warn!("No order gateway configured, using paper exchange");
            Ok(Arc::new(PaperExchange::new()))
        }
    }
}
