use crate::account::Currency;
use crate::decision::Direction;
use crate::position_sizing::SizingParams;
use crate::retry::RetryPolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Absent means in-memory stores (paper mode).
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub arbiter: ArbiterConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub balance: BalanceConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
}

impl AppConfig {
    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selector.validate()?;
        self.arbiter.validate()?;
        self.executor.validate()?;
        self.sentiment.validate()?;
        self.cycle.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

const fn default_max_connections() -> u32 {
    10
}

// ============================================================================
// Sentiment feeds
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// alternative.me compatible Fear & Greed endpoint
    pub fear_greed_url: String,
    /// CoinGecko compatible markets endpoint
    pub breadth_url: String,
    /// Number of top assets in the breadth basket
    pub basket_size: u32,
    pub fetch_timeout_ms: u64,
    pub refresh_interval_secs: u64,
    pub requests_per_minute: u32,
    pub retry: RetryPolicy,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            fear_greed_url: "https://api.alternative.me/fng/".to_string(),
            breadth_url: "https://api.coingecko.com/api/v3".to_string(),
            basket_size: 100,
            fetch_timeout_ms: 5_000,
            refresh_interval_secs: 60,
            requests_per_minute: 30,
            retry: RetryPolicy::new(2, Duration::from_millis(500)),
        }
    }
}

impl SentimentConfig {
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.basket_size == 0 {
            return Err(ConfigError::new("sentiment.basket_size", "must be positive"));
        }
        if self.requests_per_minute == 0 {
            return Err(ConfigError::new(
                "sentiment.requests_per_minute",
                "must be positive",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Dual-strategy selector
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Scores at or below this are an extreme reading
    pub lower_extreme: f64,
    /// Scores at or above this are an extreme reading
    pub upper_extreme: f64,
    /// Direction taken on extreme fear
    pub on_low_extreme: Direction,
    /// Direction taken on extreme greed
    pub on_high_extreme: Direction,
    /// |PM+ - PM-| in percentage points that counts as decisive
    pub breadth_imbalance_threshold: f64,
    /// |VWΔ| in percent that counts as decisive
    pub vw_delta_threshold: f64,
    pub extreme_confidence: f64,
    pub pulse_confidence: f64,
    pub stale_confidence_penalty: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            lower_extreme: 20.0,
            upper_extreme: 80.0,
            on_low_extreme: Direction::Long,
            on_high_extreme: Direction::Short,
            breadth_imbalance_threshold: 20.0,
            vw_delta_threshold: 1.5,
            extreme_confidence: 85.0,
            pulse_confidence: 65.0,
            stale_confidence_penalty: 15.0,
        }
    }
}

impl SelectorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.lower_extreme)
            || !(0.0..=100.0).contains(&self.upper_extreme)
            || self.lower_extreme >= self.upper_extreme
        {
            return Err(ConfigError::new(
                "selector.lower_extreme",
                format!(
                    "need 0 <= lower ({}) < upper ({}) <= 100",
                    self.lower_extreme, self.upper_extreme
                ),
            ));
        }
        if !self.on_low_extreme.is_directional() {
            return Err(ConfigError::new(
                "selector.on_low_extreme",
                "must be LONG or SHORT",
            ));
        }
        if !self.on_high_extreme.is_directional() {
            return Err(ConfigError::new(
                "selector.on_high_extreme",
                "must be LONG or SHORT",
            ));
        }
        if self.breadth_imbalance_threshold <= 0.0 || self.vw_delta_threshold <= 0.0 {
            return Err(ConfigError::new(
                "selector.breadth_imbalance_threshold",
                "pulse thresholds must be positive",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// AI arbiter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// `gemini` or `disabled`
    pub provider: String,
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Results below this confidence become NEUTRAL
    pub min_confidence: f64,
    pub cache_ttl_secs: u64,
    pub sentiment_bucket: f64,
    pub pulse_bucket: f64,
    pub vw_bucket: f64,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            min_confidence: 60.0,
            cache_ttl_secs: 300,
            sentiment_bucket: 5.0,
            pulse_bucket: 5.0,
            vw_bucket: 0.5,
            request_timeout_ms: 15_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ArbiterConfig {
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(ConfigError::new(
                "arbiter.min_confidence",
                "must be within 0..=100",
            ));
        }
        if self.sentiment_bucket <= 0.0 || self.pulse_bucket <= 0.0 || self.vw_bucket <= 0.0 {
            return Err(ConfigError::new(
                "arbiter.sentiment_bucket",
                "bucket widths must be positive",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Fan-out executor
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Users processed in parallel per batch
    pub max_concurrency: usize,
    pub risk_pct: f64,
    pub leverage: u32,
    pub max_leverage: u32,
    pub min_order_notional: Decimal,
    pub quote_currency: Currency,
    /// Order gateway; absent means paper trading
    pub gateway_url: Option<String>,
    pub key_cache_ttl_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            risk_pct: 0.05,
            leverage: 1,
            max_leverage: 3,
            min_order_notional: Decimal::TEN,
            quote_currency: Currency::Usd,
            gateway_url: None,
            key_cache_ttl_secs: 60,
            retry: RetryPolicy::new(3, Duration::from_millis(250)),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn sizing(&self) -> SizingParams {
        SizingParams {
            risk_pct: self.risk_pct,
            leverage: self.leverage,
            max_leverage: self.max_leverage,
            min_notional: self.min_order_notional,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::new(
                "executor.max_concurrency",
                "must be positive",
            ));
        }
        if !(self.risk_pct > 0.0 && self.risk_pct <= 1.0) {
            return Err(ConfigError::new("executor.risk_pct", "must be in (0, 1]"));
        }
        if self.max_leverage == 0 {
            return Err(ConfigError::new("executor.max_leverage", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Lets NON_WITHDRAWABLE balances go negative
    pub allow_non_withdrawable_credit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Budget for the decide phase (fetch + select + AI)
    pub deadline_ms: u64,
    pub workers: usize,
    pub queue_capacity: usize,
    /// A `PENDING` claim older than this is taken over on redelivery
    pub claim_timeout_secs: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 10_000,
            workers: 4,
            queue_capacity: 256,
            claim_timeout_secs: 300,
        }
    }
}

impl CycleConfig {
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    #[must_use]
    pub const fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.queue_capacity == 0 {
            return Err(ConfigError::new(
                "cycle.workers",
                "workers and queue_capacity must be positive",
            ));
        }
        if self.claim_timeout() <= self.deadline() {
            return Err(ConfigError::new(
                "cycle.claim_timeout_secs",
                "must exceed the cycle deadline",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.database.is_none());
        assert_eq!(config.selector.lower_extreme, 20.0);
        assert_eq!(config.selector.upper_extreme, 80.0);
        assert_eq!(config.arbiter.min_confidence, 60.0);
        assert_eq!(config.executor.max_concurrency, 8);
    }

    #[test]
    fn test_neutral_extreme_mapping_rejected() {
        let mut config = AppConfig::default();
        config.selector.on_high_extreme = Direction::Neutral;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "selector.on_high_extreme");
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.selector.lower_extreme = 90.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_claim_timeout_must_outlast_deadline() {
        let mut config = AppConfig::default();
        config.cycle.claim_timeout_secs = 5;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "cycle.claim_timeout_secs");
    }

    #[test]
    fn test_sizing_params_from_executor() {
        let executor = ExecutorConfig {
            leverage: 2,
            ..ExecutorConfig::default()
        };
        let params = executor.sizing();
        assert_eq!(params.leverage, 2);
        assert_eq!(params.max_leverage, 3);
        assert_eq!(params.min_notional, Decimal::TEN);
    }
}
