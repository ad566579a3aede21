//! Decision cycle scenarios wired with in-memory stores and scripted upstreams.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use pulse_trade_core::{
    AiClassifier, ArbiterConfig, BalanceAccount, BalanceConfig, Classification,
    ClassificationContext, CycleConfig, DecidedBy, Direction, Environment, ExecutorConfig,
    KeyStatus, MarketPulseSnapshot, PulseSource, RetryPolicy, SelectorConfig, SentimentReading,
    SentimentSource, ServiceError, TradingSignal, User,
};
use pulse_trade_data::{
    InMemoryAuditLog, InMemoryBalanceStore, InMemoryDecisionLog, InMemoryUserDirectory,
    StaticKeyValidator,
};
use pulse_trade_execution::{ExecutorDeps, FanoutExecutor, PaperExchange};
use pulse_trade_ledger::BalanceManager;
use pulse_trade_orchestrator::{CycleOutcome, DecisionCycle, PipelineEvent, SignalPipeline};
use pulse_trade_signals::MarketSentimentAggregator;
use pulse_trade_strategy::{AiArbiter, DualStrategySelector};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================
// Scripted upstreams
// ============================================

struct FixedSentiment {
    score: Mutex<Option<f64>>,
    delay: Mutex<Duration>,
}

#[async_trait]
impl SentimentSource for FixedSentiment {
    async fn fetch_sentiment(&self) -> Result<SentimentReading, ServiceError> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match *self.score.lock() {
            Some(score) => Ok(SentimentReading::new(score, None, Utc::now(), "fixed")),
            None => Err(ServiceError::Network("sentiment feed down".to_string())),
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct FixedPulse {
    advancing: f64,
    declining: f64,
    vw: f64,
}

#[async_trait]
impl PulseSource for FixedPulse {
    async fn fetch_pulse(&self) -> Result<MarketPulseSnapshot, ServiceError> {
        Ok(MarketPulseSnapshot {
            advancing_pct: self.advancing,
            declining_pct: self.declining,
            vw_delta_pct: self.vw,
            basket_size: 100,
            collected_at: Utc::now(),
            stale: false,
        })
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct ScriptedClassifier {
    calls: AtomicU32,
    direction: Direction,
    confidence: f64,
}

#[async_trait]
impl AiClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _context: &ClassificationContext,
    ) -> Result<Classification, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Classification {
            direction: self.direction,
            confidence: self.confidence,
            reasoning: "scripted".to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================
// Wiring
// ============================================

struct World {
    cycle: Arc<DecisionCycle>,
    aggregator: Arc<MarketSentimentAggregator>,
    sentiment: Arc<FixedSentiment>,
    classifier: Arc<ScriptedClassifier>,
    decisions: Arc<InMemoryDecisionLog>,
    audit: Arc<InMemoryAuditLog>,
    paper: Arc<PaperExchange>,
}

struct Scenario {
    score: Option<f64>,
    sentiment_delay: Duration,
    ai: (Direction, f64),
    deadline: Duration,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            score: Some(50.0),
            sentiment_delay: Duration::ZERO,
            ai: (Direction::Long, 90.0),
            deadline: Duration::from_secs(10),
        }
    }
}

fn world(scenario: Scenario) -> World {
    let sentiment = Arc::new(FixedSentiment {
        score: Mutex::new(scenario.score),
        delay: Mutex::new(scenario.sentiment_delay),
    });
    let aggregator = Arc::new(MarketSentimentAggregator::new(
        sentiment.clone(),
        // Inconclusive breadth
        Arc::new(FixedPulse {
            advancing: 50.0,
            declining: 48.0,
            vw: 0.2,
        }),
        Duration::from_secs(30),
    ));

    let classifier = Arc::new(ScriptedClassifier {
        calls: AtomicU32::new(0),
        direction: scenario.ai.0,
        confidence: scenario.ai.1,
    });
    let arbiter = Arc::new(AiArbiter::new(
        classifier.clone(),
        ArbiterConfig {
            retry: RetryPolicy::none(),
            ..ArbiterConfig::default()
        },
    ));
    let selector = Arc::new(DualStrategySelector::new(SelectorConfig::default(), arbiter));

    let users: Vec<User> = (1..=3)
        .map(|id| User {
            id,
            active: true,
            exchange: "binance".to_string(),
            environment: Environment::Testnet,
            credentials_ref: format!("vault:{id}"),
        })
        .collect();
    let balances = Arc::new(InMemoryBalanceStore::new());
    for u in &users {
        let mut account = BalanceAccount::empty(u.id);
        account.real_usd = dec!(1000);
        balances.seed(account);
    }

    let decisions = Arc::new(InMemoryDecisionLog::new());
    let audit = Arc::new(InMemoryAuditLog::new());
    let paper = Arc::new(PaperExchange::new().with_price("BTCUSDT", dec!(60000)));
    let executor = Arc::new(FanoutExecutor::new(
        ExecutorDeps {
            users: Arc::new(InMemoryUserDirectory::new(users)),
            keys: Arc::new(StaticKeyValidator::new(KeyStatus::Valid)),
            balances: Arc::new(BalanceManager::new(balances, BalanceConfig::default())),
            exchange: paper.clone(),
            audit: audit.clone(),
        },
        ExecutorConfig::default(),
    ));

    World {
        cycle: Arc::new(DecisionCycle::new(
            aggregator.clone(),
            selector,
            decisions.clone(),
            executor,
            scenario.deadline,
        )),
        aggregator,
        sentiment,
        classifier,
        decisions,
        audit,
        paper,
    }
}

fn signal(cid: &str) -> TradingSignal {
    TradingSignal {
        symbol: "BTCUSDT".to_string(),
        action: "BUY".to_string(),
        source: "tradingview".to_string(),
        emitted_at: Utc::now(),
        received_at: Utc::now(),
        correlation_id: cid.to_string(),
        reference_price: None,
    }
}

// ============================================
// Scenarios
// ============================================

#[tokio::test]
async fn test_extreme_fear_goes_long_without_ai() {
    let w = world(Scenario {
        score: Some(15.0),
        ..Scenario::default()
    });

    let outcome = w.cycle.process(&signal("s-15")).await.unwrap();

    let CycleOutcome::Executed { decision, report } = outcome else {
        panic!("expected execution, got {outcome:?}");
    };
    assert_eq!(decision.direction(), Direction::Long);
    assert_eq!(decision.decided_by(), DecidedBy::Sentiment);
    assert_eq!(report.executed(), 3);
    assert_eq!(w.classifier.calls.load(Ordering::SeqCst), 0);
    assert_eq!(w.audit.records_for("s-15").len(), 3);
}

#[tokio::test]
async fn test_low_confidence_ai_suppresses_execution() {
    let w = world(Scenario {
        score: Some(55.0),
        ai: (Direction::Long, 40.0),
        ..Scenario::default()
    });

    let outcome = w.cycle.process(&signal("s-55")).await.unwrap();

    let CycleOutcome::Suppressed { decision } = outcome else {
        panic!("expected suppression, got {outcome:?}");
    };
    assert_eq!(decision.direction(), Direction::Neutral);
    assert_eq!(decision.decided_by(), DecidedBy::Ai);
    assert_eq!(w.classifier.calls.load(Ordering::SeqCst), 1);
    assert!(w.audit.records_for("s-55").is_empty());
    assert!(w.paper.orders().is_empty());
    // NEUTRAL is still logged
    assert_eq!(w.decisions.decisions().len(), 1);
}

#[tokio::test]
async fn test_confident_ai_drives_execution() {
    let w = world(Scenario {
        score: Some(45.0),
        ai: (Direction::Short, 75.0),
        ..Scenario::default()
    });

    let outcome = w.cycle.process(&signal("s-ai")).await.unwrap();
    let decision = outcome.decision().unwrap();
    assert_eq!(decision.direction(), Direction::Short);
    assert_eq!(outcome.report().unwrap().executed(), 3);
}

#[tokio::test]
async fn test_redelivery_does_not_decide_twice() {
    let w = world(Scenario {
        score: Some(85.0),
        ..Scenario::default()
    });

    let first = w.cycle.process(&signal("dup")).await.unwrap();
    let second = w.cycle.process(&signal("dup")).await.unwrap();

    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
    assert_eq!(
        second.decision().map(|d| d.id()),
        first.decision().map(|d| d.id())
    );
    assert_eq!(w.decisions.decisions().len(), 1);
    assert_eq!(w.audit.records_for("dup").len(), 3);
}

#[tokio::test]
async fn test_data_unavailable_resolves_neutral() {
    let w = world(Scenario {
        score: None,
        ..Scenario::default()
    });

    let outcome = w.cycle.process(&signal("no-data")).await.unwrap();
    let CycleOutcome::Suppressed { decision } = outcome else {
        panic!("expected suppression, got {outcome:?}");
    };
    assert!(decision.reasoning().contains("unavailable"));
    assert!(w.paper.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_without_cache_resolves_neutral() {
    let w = world(Scenario {
        score: Some(10.0),
        sentiment_delay: Duration::from_secs(20),
        deadline: Duration::from_secs(2),
        ..Scenario::default()
    });

    let outcome = w.cycle.process(&signal("slow")).await.unwrap();
    let CycleOutcome::Suppressed { decision } = outcome else {
        panic!("expected suppression, got {outcome:?}");
    };
    assert_eq!(decision.reasoning(), "deadline exceeded");
    assert_eq!(w.classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_with_cached_extreme_still_trades() {
    let w = world(Scenario {
        score: Some(10.0),
        deadline: Duration::from_secs(2),
        ..Scenario::default()
    });
    w.aggregator.refresh().await;
    *w.sentiment.delay.lock() = Duration::from_secs(20);

    let outcome = w.cycle.process(&signal("slow-cached")).await.unwrap();
    let CycleOutcome::Executed { decision, report } = outcome else {
        panic!("expected execution, got {outcome:?}");
    };
    assert_eq!(decision.direction(), Direction::Long);
    assert_eq!(decision.decided_by(), DecidedBy::Sentiment);
    assert!(decision.reasoning().contains("stale"));
    assert_eq!(report.executed(), 3);
    assert_eq!(w.classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_with_cached_neutral_skips_ai() {
    let w = world(Scenario {
        score: Some(50.0),
        deadline: Duration::from_secs(2),
        ..Scenario::default()
    });
    w.aggregator.refresh().await;
    *w.sentiment.delay.lock() = Duration::from_secs(20);

    let outcome = w.cycle.process(&signal("slow-neutral")).await.unwrap();
    let CycleOutcome::Suppressed { decision } = outcome else {
        panic!("expected suppression, got {outcome:?}");
    };
    assert_eq!(decision.direction(), Direction::Neutral);
    // Cached inputs are stale on both sides, so the classifier is never asked
    assert_eq!(w.classifier.calls.load(Ordering::SeqCst), 0);
    assert!(w.paper.orders().is_empty());
}

#[tokio::test]
async fn test_pipeline_acknowledges_then_processes() {
    let w = world(Scenario {
        score: Some(90.0),
        ..Scenario::default()
    });
    let pipeline = SignalPipeline::spawn(
        Arc::clone(&w.cycle),
        &CycleConfig {
            workers: 2,
            queue_capacity: 8,
            ..CycleConfig::default()
        },
        CancellationToken::new(),
    );
    let handle = pipeline.handle();
    let mut events = handle.subscribe();

    let ack = handle.submit(signal("queued")).unwrap();
    assert_eq!(ack.status, "accepted");

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        PipelineEvent::Completed {
            correlation_id,
            outcome,
        } => {
            assert_eq!(correlation_id, "queued");
            assert_eq!(outcome.decision().unwrap().direction(), Direction::Short);
        }
        PipelineEvent::Failed { error, .. } => panic!("cycle failed: {error}"),
    }

    pipeline.shutdown().await;
    assert!(handle.submit(signal("late")).is_err());
}

#[tokio::test]
async fn test_shutdown_drains_accepted_signals() {
    let w = world(Scenario {
        score: Some(90.0),
        ..Scenario::default()
    });
    let pipeline = SignalPipeline::spawn(
        Arc::clone(&w.cycle),
        &CycleConfig {
            workers: 1,
            queue_capacity: 8,
            ..CycleConfig::default()
        },
        CancellationToken::new(),
    );
    let handle = pipeline.handle();

    for cid in ["drain-1", "drain-2", "drain-3"] {
        handle.submit(signal(cid)).unwrap();
    }
    pipeline.shutdown().await;

    assert_eq!(w.decisions.decisions().len(), 3);
    for cid in ["drain-1", "drain-2", "drain-3"] {
        assert_eq!(w.audit.records_for(cid).len(), 3);
    }
    assert!(handle.submit(signal("late")).is_err());
}
