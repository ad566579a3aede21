//! Dual-Strategy Selector.
//!
//! Each signal starts in `Evaluating`. Extreme sentiment decides directly,
//! decisive breadth decides directly, anything else escalates to the AI
//! arbiter whose answer becomes final.

use crate::arbiter::{AiArbiter, Resolution};
use pulse_trade_core::{
    ClassificationContext, DecidedBy, DecisionDraft, Direction, DirectionDecision,
    MarketPulseSnapshot, SelectorConfig, SentimentReading, TradingSignal,
};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Evaluating,
    EscalatedAi,
    DecidedLong,
    DecidedShort,
    DecidedNeutral,
}

impl SelectorState {
    const fn decided(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::DecidedLong,
            Direction::Short => Self::DecidedShort,
            Direction::Neutral => Self::DecidedNeutral,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::DecidedLong | Self::DecidedShort | Self::DecidedNeutral
        )
    }
}

impl fmt::Display for SelectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Evaluating => "EVALUATING",
            Self::EscalatedAi => "ESCALATED_AI",
            Self::DecidedLong => "DECIDED_LONG",
            Self::DecidedShort => "DECIDED_SHORT",
            Self::DecidedNeutral => "DECIDED_NEUTRAL",
        };
        f.write_str(name)
    }
}

/// Final decision plus the states visited to reach it.
#[derive(Debug, Clone)]
pub struct SelectorOutcome {
    pub decision: DirectionDecision,
    pub trace: Vec<SelectorState>,
    /// Set when the AI arbiter was consulted.
    pub ai_resolution: Option<Resolution>,
}

impl SelectorOutcome {
    #[must_use]
    pub fn escalated(&self) -> bool {
        self.trace.contains(&SelectorState::EscalatedAi)
    }

    #[must_use]
    pub fn final_state(&self) -> SelectorState {
        self.trace
            .last()
            .copied()
            .unwrap_or(SelectorState::Evaluating)
    }

    /// Trace rendered as `EVALUATING -> ESCALATED_AI -> DECIDED_LONG`.
    #[must_use]
    pub fn trace_string(&self) -> String {
        self.trace
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

enum PulseVerdict {
    Decisive(Direction, String),
    Inconclusive(String),
}

pub struct DualStrategySelector {
    config: SelectorConfig,
    arbiter: Arc<AiArbiter>,
}

impl DualStrategySelector {
    #[must_use]
    pub fn new(config: SelectorConfig, arbiter: Arc<AiArbiter>) -> Self {
        Self { config, arbiter }
    }

    #[must_use]
    pub const fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Decides a direction for `signal`.
    ///
    /// `pulse` may be `None` when breadth data is unavailable; only the
    /// extreme-sentiment path can decide without it.
    pub async fn select(
        &self,
        signal: &TradingSignal,
        sentiment: SentimentReading,
        pulse: Option<MarketPulseSnapshot>,
    ) -> SelectorOutcome {
        let mut trace = vec![SelectorState::Evaluating];
        let score = sentiment.score;
        let mut draft = DecisionDraft::neutral(
            signal.correlation_id.clone(),
            signal.symbol.clone(),
            DecidedBy::Sentiment,
            String::new(),
        );

        // 1. Extreme sentiment
        if let Some(direction) = self.extreme_direction(score) {
            draft.direction = direction;
            draft.confidence = self.penalize(self.config.extreme_confidence, sentiment.stale);
            draft.reasoning = format!(
                "sentiment {:.0} ({}) is extreme (thresholds {:.0}/{:.0}) -> {}{}",
                score,
                sentiment.classification,
                self.config.lower_extreme,
                self.config.upper_extreme,
                direction,
                stale_note(sentiment.stale, false)
            );
            trace.push(SelectorState::decided(direction));
            return finish(draft.with_inputs(Some(sentiment), pulse), trace, None);
        }

        let Some(pulse) = pulse else {
            draft.reasoning = format!(
                "sentiment {score:.0} in neutral band and breadth data unavailable"
            );
            trace.push(SelectorState::DecidedNeutral);
            return finish(draft.with_inputs(Some(sentiment), None), trace, None);
        };

        // 2. Breadth
        match self.pulse_verdict(&pulse) {
            PulseVerdict::Decisive(direction, why) => {
                draft.direction = direction;
                draft.decided_by = DecidedBy::Pulse;
                draft.confidence = self.penalize(
                    self.config.pulse_confidence,
                    pulse.stale || sentiment.stale,
                );
                draft.reasoning = format!(
                    "sentiment {:.0} in neutral band; {} -> {}{}",
                    score,
                    why,
                    direction,
                    stale_note(sentiment.stale, pulse.stale)
                );
                trace.push(SelectorState::decided(direction));
                finish(draft.with_inputs(Some(sentiment), Some(pulse)), trace, None)
            }
            // 3. AI
            PulseVerdict::Inconclusive(why) => {
                trace.push(SelectorState::EscalatedAi);
                tracing::info!(
                    "[{}] {} escalated to AI: sentiment {:.0}, {}",
                    signal.correlation_id,
                    signal.symbol,
                    score,
                    why
                );

                let context = ClassificationContext {
                    symbol: signal.symbol.clone(),
                    sentiment,
                    pulse,
                };
                let arbitration = self.arbiter.classify(&context).await;

                draft.direction = arbitration.direction;
                draft.decided_by = DecidedBy::Ai;
                draft.confidence = arbitration.confidence;
                draft.reasoning = format!("{why}; AI: {}", arbitration.reasoning);
                trace.push(SelectorState::decided(arbitration.direction));

                let ClassificationContext {
                    sentiment, pulse, ..
                } = context;
                finish(
                    draft.with_inputs(Some(sentiment), Some(pulse)),
                    trace,
                    Some(arbitration.resolution),
                )
            }
        }
    }

    fn extreme_direction(&self, score: f64) -> Option<Direction> {
        if score <= self.config.lower_extreme {
            Some(self.config.on_low_extreme)
        } else if score >= self.config.upper_extreme {
            Some(self.config.on_high_extreme)
        } else {
            None
        }
    }

    fn pulse_verdict(&self, pulse: &MarketPulseSnapshot) -> PulseVerdict {
        if pulse.basket_size == 0 {
            return PulseVerdict::Inconclusive("breadth basket is empty".to_string());
        }

        let imbalance = pulse.imbalance();
        let breadth = threshold_direction(imbalance, self.config.breadth_imbalance_threshold);
        let volume = threshold_direction(pulse.vw_delta_pct, self.config.vw_delta_threshold);

        match (breadth, volume) {
            (Some(b), Some(v)) if b != v => PulseVerdict::Inconclusive(format!(
                "breadth imbalance {imbalance:+.1}pp and VW delta {:+.2}% disagree",
                pulse.vw_delta_pct
            )),
            (Some(b), _) => PulseVerdict::Decisive(
                b,
                format!("breadth imbalance {imbalance:+.1}pp is decisive"),
            ),
            (None, Some(v)) => PulseVerdict::Decisive(
                v,
                format!("VW delta {:+.2}% is decisive", pulse.vw_delta_pct),
            ),
            (None, None) => PulseVerdict::Inconclusive(format!(
                "breadth imbalance {imbalance:+.1}pp and VW delta {:+.2}% are inconclusive",
                pulse.vw_delta_pct
            )),
        }
    }

    fn penalize(&self, confidence: f64, stale: bool) -> f64 {
        if stale {
            confidence - self.config.stale_confidence_penalty
        } else {
            confidence
        }
    }
}

/// Decisive only when `value` strictly exceeds the threshold either way.
fn threshold_direction(value: f64, threshold: f64) -> Option<Direction> {
    if value > threshold {
        Some(Direction::Long)
    } else if value < -threshold {
        Some(Direction::Short)
    } else {
        None
    }
}

fn stale_note(sentiment_stale: bool, pulse_stale: bool) -> &'static str {
    match (sentiment_stale, pulse_stale) {
        (true, true) => " (sentiment and breadth stale)",
        (true, false) => " (sentiment stale)",
        (false, true) => " (breadth stale)",
        (false, false) => "",
    }
}

fn finish(
    draft: DecisionDraft,
    trace: Vec<SelectorState>,
    ai_resolution: Option<Resolution>,
) -> SelectorOutcome {
    SelectorOutcome {
        decision: draft.seal(),
        trace,
        ai_resolution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use pulse_trade_core::{
        AiClassifier, ArbiterConfig, Classification, RetryPolicy, ServiceError,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedClassifier {
        calls: AtomicU32,
        direction: Direction,
        confidence: f64,
    }

    #[async_trait]
    impl AiClassifier for FixedClassifier {
        async fn classify(
            &self,
            _context: &ClassificationContext,
        ) -> Result<Classification, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Classification {
                direction: self.direction,
                confidence: self.confidence,
                reasoning: "fixed".to_string(),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn selector(direction: Direction, confidence: f64) -> (DualStrategySelector, Arc<FixedClassifier>) {
        let classifier = Arc::new(FixedClassifier {
            calls: AtomicU32::new(0),
            direction,
            confidence,
        });
        let arbiter = AiArbiter::new(
            classifier.clone(),
            ArbiterConfig {
                retry: RetryPolicy::none(),
                ..ArbiterConfig::default()
            },
        );
        (
            DualStrategySelector::new(SelectorConfig::default(), Arc::new(arbiter)),
            classifier,
        )
    }

    fn signal(correlation_id: &str) -> TradingSignal {
        TradingSignal {
            symbol: "BTCUSDT".to_string(),
            action: "BUY".to_string(),
            source: "test".to_string(),
            emitted_at: Utc::now(),
            received_at: Utc::now(),
            correlation_id: correlation_id.to_string(),
            reference_price: None,
        }
    }

    fn sentiment(score: f64) -> SentimentReading {
        SentimentReading::new(score, None, Utc::now(), "test")
    }

    fn pulse(advancing: f64, declining: f64, vw: f64) -> MarketPulseSnapshot {
        MarketPulseSnapshot {
            advancing_pct: advancing,
            declining_pct: declining,
            vw_delta_pct: vw,
            basket_size: 100,
            collected_at: Utc::now(),
            stale: false,
        }
    }

    fn inconclusive() -> MarketPulseSnapshot {
        pulse(50.0, 45.0, 0.2)
    }

    #[tokio::test]
    async fn test_extremes_never_call_ai() {
        let (selector, classifier) = selector(Direction::Short, 99.0);
        for score in [0.0, 5.0, 15.0, 20.0, 80.0, 92.0, 100.0] {
            let outcome = selector
                .select(&signal("x"), sentiment(score), Some(inconclusive()))
                .await;
            assert!(outcome.decision.direction().is_directional(), "score {score}");
            assert_eq!(outcome.decision.decided_by(), DecidedBy::Sentiment);
            assert!(!outcome.escalated());
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extreme_fear_goes_long_by_default() {
        let (selector, classifier) = selector(Direction::Short, 99.0);
        let outcome = selector.select(&signal("a"), sentiment(15.0), None).await;

        assert_eq!(outcome.decision.direction(), Direction::Long);
        assert!((outcome.decision.confidence() - 85.0).abs() < f64::EPSILON);
        assert_eq!(
            outcome.trace,
            vec![SelectorState::Evaluating, SelectorState::DecidedLong]
        );
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extreme_mapping_is_configurable() {
        let (selector, _) = selector(Direction::Neutral, 0.0);
        let momentum = DualStrategySelector::new(
            SelectorConfig {
                on_low_extreme: Direction::Short,
                on_high_extreme: Direction::Long,
                ..SelectorConfig::default()
            },
            Arc::clone(&selector.arbiter),
        );
        let outcome = momentum.select(&signal("m"), sentiment(85.0), None).await;
        assert_eq!(outcome.decision.direction(), Direction::Long);
    }

    #[tokio::test]
    async fn test_stale_extreme_loses_confidence() {
        let (selector, _) = selector(Direction::Neutral, 0.0);
        let outcome = selector
            .select(&signal("s"), sentiment(90.0).into_stale(), None)
            .await;
        assert_eq!(outcome.decision.direction(), Direction::Short);
        assert!((outcome.decision.confidence() - 70.0).abs() < f64::EPSILON);
        assert!(outcome.decision.reasoning().contains("stale"));
    }

    #[tokio::test]
    async fn test_neutral_band_boundaries_are_inclusive() {
        let (selector, classifier) = selector(Direction::Long, 90.0);
        for score in [21.0, 50.0, 79.0] {
            let outcome = selector
                .select(&signal("b"), sentiment(score), Some(inconclusive()))
                .await;
            assert_eq!(outcome.decision.decided_by(), DecidedBy::Ai);
        }
        // 21 and 79 land in different cache buckets from 50
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_decisive_breadth_decides_without_ai() {
        let (selector, classifier) = selector(Direction::Long, 90.0);

        let outcome = selector
            .select(&signal("p"), sentiment(50.0), Some(pulse(30.0, 65.0, -0.4)))
            .await;
        assert_eq!(outcome.decision.direction(), Direction::Short);
        assert_eq!(outcome.decision.decided_by(), DecidedBy::Pulse);
        assert!((outcome.decision.confidence() - 65.0).abs() < f64::EPSILON);

        let by_volume = selector
            .select(&signal("v"), sentiment(50.0), Some(pulse(50.0, 48.0, 2.1)))
            .await;
        assert_eq!(by_volume.decision.direction(), Direction::Long);

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_breadth_at_threshold_is_not_decisive() {
        let (selector, classifier) = selector(Direction::Long, 90.0);
        // imbalance exactly 20pp, VW delta exactly 1.5%
        let outcome = selector
            .select(&signal("edge"), sentiment(50.0), Some(pulse(60.0, 40.0, 1.5)))
            .await;
        assert!(outcome.escalated());
        assert_eq!(outcome.decision.decided_by(), DecidedBy::Ai);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conflicting_breadth_escalates() {
        let (selector, classifier) = selector(Direction::Short, 70.0);
        let outcome = selector
            .select(&signal("c"), sentiment(50.0), Some(pulse(70.0, 20.0, -2.0)))
            .await;
        assert!(outcome.escalated());
        assert_eq!(outcome.decision.direction(), Direction::Short);
        assert_eq!(outcome.ai_resolution, Some(Resolution::Classified));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inconclusive_breadth_calls_ai_exactly_once() {
        let (selector, classifier) = selector(Direction::Long, 75.0);
        let outcome = selector
            .select(&signal("ai"), sentiment(55.0), Some(inconclusive()))
            .await;

        assert_eq!(outcome.decision.direction(), Direction::Long);
        assert_eq!(outcome.decision.decided_by(), DecidedBy::Ai);
        assert_eq!(
            outcome.trace_string(),
            "EVALUATING -> ESCALATED_AI -> DECIDED_LONG"
        );
        assert!(outcome.decision.pulse().is_some());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_ai_yields_neutral() {
        let (selector, _) = selector(Direction::Long, 40.0);
        let outcome = selector
            .select(&signal("low"), sentiment(55.0), Some(inconclusive()))
            .await;

        assert_eq!(outcome.decision.direction(), Direction::Neutral);
        assert!(!outcome.decision.is_actionable());
        assert_eq!(outcome.final_state(), SelectorState::DecidedNeutral);
        assert_eq!(outcome.ai_resolution, Some(Resolution::LowConfidence));
    }

    #[tokio::test]
    async fn test_missing_breadth_in_neutral_band_is_neutral() {
        let (selector, classifier) = selector(Direction::Long, 90.0);
        let outcome = selector.select(&signal("n"), sentiment(50.0), None).await;
        assert_eq!(outcome.decision.direction(), Direction::Neutral);
        assert!(outcome.decision.reasoning().contains("unavailable"));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }
}
