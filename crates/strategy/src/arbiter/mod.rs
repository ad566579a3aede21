//! AI Arbitration Adapter.
//!
//! Resolves neutral-band sentiment into a direction through an external
//! [`AiClassifier`]. Calls are gated in this order:
//!
//! 1. Deterministic pre-filters (no usable breadth, both inputs stale)
//! 2. TTL cache keyed by a bucketed [`Fingerprint`]
//! 3. The classifier itself, under the retry policy and a per-call timeout
//!
//! Every path resolves to an [`Arbitration`]; failures become NEUTRAL.

pub mod cache;
pub mod gemini;

pub use cache::{DecisionCache, Fingerprint};
pub use gemini::GeminiClassifier;

use pulse_trade_core::{
    AiClassifier, ArbiterConfig, Classification, ClassificationContext, Direction, ServiceError,
};
use std::sync::Arc;
use thiserror::Error;

/// How an arbitration was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A rule resolved it without calling the classifier.
    Prefiltered,
    /// Reused a cached result for the same fingerprint.
    CacheHit,
    /// Classifier answered with sufficient confidence.
    Classified,
    /// Classifier answered below the confidence floor; coerced to NEUTRAL.
    LowConfidence,
    /// Classifier failed after all retries; NEUTRAL for this cycle.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    pub direction: Direction,
    pub confidence: f64,
    pub reasoning: String,
    pub resolution: Resolution,
}

impl Arbitration {
    fn neutral(reasoning: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            direction: Direction::Neutral,
            confidence: 0.0,
            reasoning: reasoning.into(),
            resolution,
        }
    }
}

#[derive(Debug, Error)]
enum ArbiterError {
    #[error("classifier {name} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        name: String,
        attempts: u32,
        source: ServiceError,
    },
}

pub struct AiArbiter {
    classifier: Arc<dyn AiClassifier>,
    config: ArbiterConfig,
    cache: DecisionCache,
}

impl AiArbiter {
    #[must_use]
    pub fn new(classifier: Arc<dyn AiClassifier>, config: ArbiterConfig) -> Self {
        let cache = DecisionCache::new(config.cache_ttl());
        Self {
            classifier,
            config,
            cache,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    #[must_use]
    pub const fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Classifies `context`. Never fails.
    pub async fn classify(&self, context: &ClassificationContext) -> Arbitration {
        if let Some(reason) = prefilter(context) {
            tracing::info!("AI prefilter resolved {} to NEUTRAL: {}", context.symbol, reason);
            return Arbitration::neutral(reason, Resolution::Prefiltered);
        }

        let key = Fingerprint::of(context, &self.config);
        if let Some(mut cached) = self.cache.get(&key) {
            tracing::debug!("AI cache hit for {:?}", key);
            cached.resolution = Resolution::CacheHit;
            return cached;
        }

        match self.call_classifier(context).await {
            Ok(classification) => {
                let arbitration = self.coerce(classification);
                tracing::info!(
                    "AI classified {} as {} ({:.0}%, {:?})",
                    context.symbol,
                    arbitration.direction,
                    arbitration.confidence,
                    arbitration.resolution
                );
                self.cache.insert(key, arbitration.clone());
                arbitration
            }
            Err(e) => {
                tracing::error!("AI unavailable for {}, resolving NEUTRAL: {}", context.symbol, e);
                Arbitration::neutral(format!("AI unavailable: {e}"), Resolution::Unavailable)
            }
        }
    }

    async fn call_classifier(
        &self,
        context: &ClassificationContext,
    ) -> Result<Classification, ArbiterError> {
        let timeout = self.config.request_timeout();
        let outcome = self
            .config
            .retry
            .run(
                "AI classify",
                |_| async move {
                    match tokio::time::timeout(timeout, self.classifier.classify(context)).await {
                        Ok(result) => result,
                        Err(_) => Err(ServiceError::Timeout(format!(
                            "classifier did not answer within {}ms",
                            timeout.as_millis()
                        ))),
                    }
                },
                ServiceError::is_retryable,
            )
            .await;

        outcome.result.map_err(|source| ArbiterError::Exhausted {
            name: self.classifier.name().to_string(),
            attempts: outcome.attempts,
            source,
        })
    }

    /// Applies the confidence floor.
    fn coerce(&self, classification: Classification) -> Arbitration {
        let confidence = if classification.confidence.is_finite() {
            classification.confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };

        if confidence < self.config.min_confidence {
            return Arbitration {
                direction: Direction::Neutral,
                confidence,
                reasoning: format!(
                    "confidence {:.0} below minimum {:.0} (classifier said {}): {}",
                    confidence,
                    self.config.min_confidence,
                    classification.direction,
                    classification.reasoning
                ),
                resolution: Resolution::LowConfidence,
            };
        }

        Arbitration {
            direction: classification.direction,
            confidence,
            reasoning: classification.reasoning,
            resolution: Resolution::Classified,
        }
    }
}

/// Cases a rule can settle without spending a classifier call.
fn prefilter(context: &ClassificationContext) -> Option<String> {
    if context.pulse.basket_size == 0 {
        return Some("breadth basket is empty".to_string());
    }
    if context.sentiment.stale && context.pulse.stale {
        return Some("sentiment and breadth are both stale".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use pulse_trade_core::{MarketPulseSnapshot, RetryPolicy, SentimentReading};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingClassifier {
        calls: AtomicU32,
        responses: Mutex<VecDeque<Result<Classification, ServiceError>>>,
    }

    impl CountingClassifier {
        fn new(responses: Vec<Result<Classification, ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                responses: Mutex::new(responses.into()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiClassifier for CountingClassifier {
        async fn classify(
            &self,
            _context: &ClassificationContext,
        ) -> Result<Classification, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ServiceError::Network("no scripted response".to_string())))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn answer(direction: Direction, confidence: f64) -> Result<Classification, ServiceError> {
        Ok(Classification {
            direction,
            confidence,
            reasoning: "scripted".to_string(),
        })
    }

    fn context(score: f64, basket_size: usize) -> ClassificationContext {
        ClassificationContext {
            symbol: "BTCUSDT".to_string(),
            sentiment: SentimentReading::new(score, None, Utc::now(), "test"),
            pulse: MarketPulseSnapshot {
                advancing_pct: 52.0,
                declining_pct: 46.0,
                vw_delta_pct: 0.3,
                basket_size,
                collected_at: Utc::now(),
                stale: false,
            },
        }
    }

    fn config() -> ArbiterConfig {
        ArbiterConfig {
            retry: RetryPolicy::new(3, Duration::from_millis(10)),
            ..ArbiterConfig::default()
        }
    }

    #[tokio::test]
    async fn test_confident_answer_is_used() {
        let classifier = CountingClassifier::new(vec![answer(Direction::Short, 72.0)]);
        let arbiter = AiArbiter::new(classifier.clone(), config());

        let result = arbiter.classify(&context(55.0, 100)).await;
        assert_eq!(result.direction, Direction::Short);
        assert_eq!(result.resolution, Resolution::Classified);
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_is_coerced_to_neutral() {
        let classifier = CountingClassifier::new(vec![answer(Direction::Long, 40.0)]);
        let arbiter = AiArbiter::new(classifier, config());

        let result = arbiter.classify(&context(55.0, 100)).await;
        assert_eq!(result.direction, Direction::Neutral);
        assert_eq!(result.resolution, Resolution::LowConfidence);
        assert!((result.confidence - 40.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_call() {
        let classifier = CountingClassifier::new(vec![answer(Direction::Long, 80.0)]);
        let arbiter = AiArbiter::new(classifier.clone(), config());

        let first = arbiter.classify(&context(52.0, 100)).await;
        // 53 falls in the same 5-point bucket as 52
        let second = arbiter.classify(&context(53.0, 100)).await;

        assert_eq!(first.direction, Direction::Long);
        assert_eq!(second.direction, Direction::Long);
        assert_eq!(second.resolution, Resolution::CacheHit);
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_ttl() {
        let classifier = CountingClassifier::new(vec![
            answer(Direction::Long, 80.0),
            answer(Direction::Short, 80.0),
        ]);
        let arbiter = AiArbiter::new(classifier.clone(), config());

        arbiter.classify(&context(52.0, 100)).await;
        tokio::time::advance(Duration::from_secs(301)).await;
        let again = arbiter.classify(&context(52.0, 100)).await;

        assert_eq!(again.direction, Direction::Short);
        assert_eq!(classifier.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_resolves_neutral_without_caching() {
        let classifier = CountingClassifier::new(vec![
            Err(ServiceError::Timeout("slow".to_string())),
            Err(ServiceError::api(503, "overloaded")),
            Err(ServiceError::Network("reset".to_string())),
        ]);
        let arbiter = AiArbiter::new(classifier.clone(), config());

        let result = arbiter.classify(&context(50.0, 100)).await;
        assert_eq!(result.direction, Direction::Neutral);
        assert_eq!(result.resolution, Resolution::Unavailable);
        assert_eq!(classifier.calls(), 3);
        assert!(arbiter.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let classifier = CountingClassifier::new(vec![
            Err(ServiceError::Timeout("slow".to_string())),
            answer(Direction::Long, 90.0),
        ]);
        let arbiter = AiArbiter::new(classifier.clone(), config());

        let result = arbiter.classify(&context(50.0, 100)).await;
        assert_eq!(result.direction, Direction::Long);
        assert_eq!(classifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_prefilter_skips_classifier() {
        let classifier = CountingClassifier::new(vec![answer(Direction::Long, 90.0)]);
        let arbiter = AiArbiter::new(classifier.clone(), config());

        let empty_basket = arbiter.classify(&context(50.0, 0)).await;
        assert_eq!(empty_basket.resolution, Resolution::Prefiltered);

        let mut stale = context(50.0, 100);
        stale.sentiment.stale = true;
        stale.pulse.stale = true;
        let both_stale = arbiter.classify(&stale).await;
        assert_eq!(both_stale.direction, Direction::Neutral);
        assert_eq!(both_stale.resolution, Resolution::Prefiltered);

        assert_eq!(classifier.calls(), 0);
    }
}
