//! Direction decisions produced once per signal cycle.

use crate::market::{MarketPulseSnapshot, SentimentReading};
use crate::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
            Self::Neutral => Self::Neutral,
        }
    }

    /// Returns true if this direction has a directional bias.
    #[must_use]
    pub const fn is_directional(self) -> bool {
        !matches!(self, Self::Neutral)
    }

    /// Order side used to express the direction, `None` for NEUTRAL.
    #[must_use]
    pub const fn order_side(self) -> Option<OrderSide> {
        match self {
            Self::Long => Some(OrderSide::Buy),
            Self::Short => Some(OrderSide::Sell),
            Self::Neutral => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
            Self::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" | "BUY" | "UP" => Ok(Self::Long),
            "SHORT" | "SELL" | "DOWN" => Ok(Self::Short),
            "NEUTRAL" | "HOLD" | "NONE" => Ok(Self::Neutral),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Which stage of the selector produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecidedBy {
    Sentiment,
    Pulse,
    Ai,
}

impl DecidedBy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sentiment => "SENTIMENT",
            Self::Pulse => "PULSE",
            Self::Ai => "AI",
        }
    }
}

impl fmt::Display for DecidedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable builder for a [`DirectionDecision`]. Sealed into the immutable
/// decision with [`DecisionDraft::seal`].
#[derive(Debug, Clone)]
pub struct DecisionDraft {
    pub correlation_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,
    pub decided_by: DecidedBy,
    pub reasoning: String,
    pub sentiment: Option<SentimentReading>,
    pub pulse: Option<MarketPulseSnapshot>,
}

impl DecisionDraft {
    /// Starts a NEUTRAL draft with zero confidence.
    pub fn neutral(
        correlation_id: impl Into<String>,
        symbol: impl Into<String>,
        decided_by: DecidedBy,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            symbol: symbol.into(),
            direction: Direction::Neutral,
            confidence: 0.0,
            decided_by,
            reasoning: reasoning.into(),
            sentiment: None,
            pulse: None,
        }
    }

    #[must_use]
    pub fn with_inputs(
        mut self,
        sentiment: Option<SentimentReading>,
        pulse: Option<MarketPulseSnapshot>,
    ) -> Self {
        self.sentiment = sentiment;
        self.pulse = pulse;
        self
    }

    /// Freezes the draft. Confidence is clamped to 0..=100.
    #[must_use]
    pub fn seal(self) -> DirectionDecision {
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        DirectionDecision {
            id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            symbol: self.symbol,
            direction: self.direction,
            confidence,
            decided_by: self.decided_by,
            reasoning: self.reasoning,
            sentiment: self.sentiment,
            pulse: self.pulse,
            decided_at: Utc::now(),
        }
    }
}

/// Final direction for one signal cycle. Immutable once sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionDecision {
    id: Uuid,
    correlation_id: String,
    symbol: String,
    direction: Direction,
    confidence: f64,
    decided_by: DecidedBy,
    reasoning: String,
    sentiment: Option<SentimentReading>,
    pulse: Option<MarketPulseSnapshot>,
    decided_at: DateTime<Utc>,
}

impl DirectionDecision {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub const fn decided_by(&self) -> DecidedBy {
        self.decided_by
    }

    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    #[must_use]
    pub const fn sentiment(&self) -> Option<&SentimentReading> {
        self.sentiment.as_ref()
    }

    #[must_use]
    pub const fn pulse(&self) -> Option<&MarketPulseSnapshot> {
        self.pulse.as_ref()
    }

    #[must_use]
    pub const fn decided_at(&self) -> DateTime<Utc> {
        self.decided_at
    }

    /// True when the decision may reach the fan-out executor.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        self.direction.is_directional()
    }
}
