//! Market mood inputs consumed by the direction selector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite sentiment index reading (0 = extreme fear, 100 = extreme greed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// Index value, clamped to 0..=100
    pub score: f64,
    /// Human label, e.g. "Extreme Fear"
    pub classification: String,
    /// When the upstream collected the value
    pub collected_at: DateTime<Utc>,
    /// Upstream identifier
    pub source: String,
    /// True when served from cache after an upstream failure
    pub stale: bool,
}

impl SentimentReading {
    /// Creates a fresh reading, deriving the label when the upstream omitted one.
    #[must_use]
    pub fn new(
        score: f64,
        classification: Option<String>,
        collected_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        let score = score.clamp(0.0, 100.0);
        let classification = classification
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| SentimentClass::from_score(score).label().to_string());
        Self {
            score,
            classification,
            collected_at,
            source: source.into(),
            stale: false,
        }
    }

    /// Returns a copy flagged as stale.
    #[must_use]
    pub fn into_stale(mut self) -> Self {
        self.stale = true;
        self
    }
}

/// Standard five-band sentiment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentClass {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentClass {
    /// Buckets a score: 0-24, 25-44, 45-55, 56-75, 76-100.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 25.0 => Self::ExtremeFear,
            s if s < 45.0 => Self::Fear,
            s if s <= 55.0 => Self::Neutral,
            s if s <= 75.0 => Self::Greed,
            _ => Self::ExtremeGreed,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ExtremeFear => "Extreme Fear",
            Self::Fear => "Fear",
            Self::Neutral => "Neutral",
            Self::Greed => "Greed",
            Self::ExtremeGreed => "Extreme Greed",
        }
    }
}

/// Breadth snapshot over a reference basket of top assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPulseSnapshot {
    /// Percent of basket advancing (PM+), 0..=100
    pub advancing_pct: f64,
    /// Percent of basket declining (PM-), 0..=100
    pub declining_pct: f64,
    /// Volume-weighted average price change in percent (VWΔ)
    pub vw_delta_pct: f64,
    /// Number of assets that contributed
    pub basket_size: usize,
    pub collected_at: DateTime<Utc>,
    /// True when served from cache after an upstream failure
    pub stale: bool,
}

impl MarketPulseSnapshot {
    /// Breadth imbalance in percentage points (PM+ minus PM-).
    #[must_use]
    pub fn imbalance(&self) -> f64 {
        self.advancing_pct - self.declining_pct
    }

    /// Returns a copy flagged as stale.
    #[must_use]
    pub fn into_stale(mut self) -> Self {
        self.stale = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_bands() {
        assert_eq!(SentimentClass::from_score(0.0), SentimentClass::ExtremeFear);
        assert_eq!(SentimentClass::from_score(24.9), SentimentClass::ExtremeFear);
        assert_eq!(SentimentClass::from_score(25.0), SentimentClass::Fear);
        assert_eq!(SentimentClass::from_score(50.0), SentimentClass::Neutral);
        assert_eq!(SentimentClass::from_score(55.0), SentimentClass::Neutral);
        assert_eq!(SentimentClass::from_score(60.0), SentimentClass::Greed);
        assert_eq!(SentimentClass::from_score(100.0), SentimentClass::ExtremeGreed);
    }

    #[test]
    fn test_reading_derives_missing_label_and_clamps() {
        let reading = SentimentReading::new(130.0, None, Utc::now(), "test");
        assert!((reading.score - 100.0).abs() < f64::EPSILON);
        assert_eq!(reading.classification, "Extreme Greed");
        assert!(!reading.stale);

        let labelled = SentimentReading::new(10.0, Some("Panic".to_string()), Utc::now(), "test");
        assert_eq!(labelled.classification, "Panic");
        assert!(labelled.into_stale().stale);
    }

    #[test]
    fn test_pulse_imbalance() {
        let pulse = MarketPulseSnapshot {
            advancing_pct: 70.0,
            declining_pct: 25.0,
            vw_delta_pct: 1.2,
            basket_size: 100,
            collected_at: Utc::now(),
            stale: false,
        };
        assert!((pulse.imbalance() - 45.0).abs() < f64::EPSILON);
    }
}
