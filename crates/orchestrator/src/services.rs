//! Builds every component from one [`AppConfig`].

use crate::cycle::DecisionCycle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use pulse_trade_core::{
    AiClassifier, AppConfig, AuditLog, BalanceStore, Classification, ClassificationContext,
    DecisionLog, KeyStatus, KeyValidator, ServiceError, UserDirectory,
};
use pulse_trade_data::{
    InMemoryAuditLog, InMemoryBalanceStore, InMemoryDecisionLog, InMemoryUserDirectory,
    Repositories, StaticKeyValidator,
};
use pulse_trade_execution::{exchange_from_config, CachedKeyValidator, ExecutorDeps, FanoutExecutor};
use pulse_trade_ledger::BalanceManager;
use pulse_trade_signals::{aggregator_from_config, MarketSentimentAggregator};
use pulse_trade_strategy::{AiArbiter, DualStrategySelector, GeminiClassifier};
use std::sync::Arc;
use std::time::Duration;

/// Stand-in when no classifier is configured; every escalation resolves NEUTRAL.
struct DisabledClassifier {
    reason: String,
}

#[async_trait]
impl AiClassifier for DisabledClassifier {
    async fn classify(
        &self,
        _context: &ClassificationContext,
    ) -> Result<Classification, ServiceError> {
        Err(ServiceError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Stores backing one process.
pub struct Stores {
    pub decisions: Arc<dyn DecisionLog>,
    pub audit: Arc<dyn AuditLog>,
    pub balances: Arc<dyn BalanceStore>,
    pub users: Arc<dyn UserDirectory>,
    pub keys: Arc<dyn KeyValidator>,
}

impl Stores {
    /// `PostgreSQL` when configured, in-memory otherwise.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached or migrated.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        if let Some(db) = &config.database {
            let pool = pulse_trade_data::connect(db).await?;
            let repos = Repositories::new(pool);
            return Ok(Self {
                decisions: Arc::new(
                    repos
                        .decisions
                        .with_claim_timeout(config.cycle.claim_timeout()),
                ),
                audit: Arc::new(repos.executions),
                balances: Arc::new(repos.balances),
                users: Arc::new(repos.users),
                keys: Arc::new(repos.keys),
            });
        }

        tracing::warn!("No database configured, using in-memory stores with no users");
        Ok(Self {
            decisions: Arc::new(
                InMemoryDecisionLog::new().with_claim_timeout(config.cycle.claim_timeout()),
            ),
            ..Self::in_memory()
        })
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            decisions: Arc::new(InMemoryDecisionLog::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            balances: Arc::new(InMemoryBalanceStore::new()),
            users: Arc::new(InMemoryUserDirectory::default()),
            keys: Arc::new(StaticKeyValidator::new(KeyStatus::Pending)),
        }
    }
}

pub struct Services {
    pub config: AppConfig,
    pub aggregator: Arc<MarketSentimentAggregator>,
    pub selector: Arc<DualStrategySelector>,
    pub balances: Arc<BalanceManager>,
    pub decisions: Arc<dyn DecisionLog>,
    pub executor: Arc<FanoutExecutor>,
    pub cycle: Arc<DecisionCycle>,
}

impl Services {
    /// # Errors
    /// Returns an error if a store or HTTP client cannot be created.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let stores = Stores::from_config(&config).await?;
        Self::with_stores(config, stores)
    }

    /// # Errors
    /// Returns an error if an HTTP client cannot be created.
    pub fn with_stores(config: AppConfig, stores: Stores) -> Result<Self> {
        let aggregator = Arc::new(
            aggregator_from_config(&config.sentiment).context("building sentiment aggregator")?,
        );

        let arbiter = Arc::new(AiArbiter::new(classifier(&config), config.arbiter.clone()));
        let selector = Arc::new(DualStrategySelector::new(config.selector.clone(), arbiter));

        let balances = Arc::new(BalanceManager::new(
            stores.balances,
            config.balance.clone(),
        ));

        let keys: Arc<dyn KeyValidator> = Arc::new(CachedKeyValidator::new(
            stores.keys,
            Duration::from_secs(config.executor.key_cache_ttl_secs),
        ));
        let exchange = exchange_from_config(&config.executor).context("building order gateway")?;
        let executor = Arc::new(FanoutExecutor::new(
            ExecutorDeps {
                users: stores.users,
                keys,
                balances: Arc::clone(&balances),
                exchange,
                audit: stores.audit,
            },
            config.executor.clone(),
        ));

        let cycle = Arc::new(DecisionCycle::new(
            Arc::clone(&aggregator),
            Arc::clone(&selector),
            Arc::clone(&stores.decisions),
            Arc::clone(&executor),
            config.cycle.deadline(),
        ));

        Ok(Self {
            config,
            aggregator,
            selector,
            balances,
            decisions: stores.decisions,
            executor,
            cycle,
        })
    }
}

fn classifier(config: &AppConfig) -> Arc<dyn AiClassifier> {
    let provider = config.arbiter.provider.to_ascii_lowercase();
    if provider != "gemini" {
        tracing::warn!("AI provider '{}' not supported, escalations resolve NEUTRAL", provider);
        return Arc::new(DisabledClassifier {
            reason: format!("provider {provider} not supported"),
        });
    }
    match GeminiClassifier::from_config(&config.arbiter) {
        Ok(gemini) => {
            tracing::info!("AI arbiter using Gemini model {}", config.arbiter.model);
            Arc::new(gemini)
        }
        Err(e) => {
            tracing::warn!("AI arbiter disabled: {}", e);
            Arc::new(DisabledClassifier {
                reason: e.to_string(),
            })
        }
    }
}
