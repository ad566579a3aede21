//! Inbound trading signals and their validation.
//!
//! A signal only names the instrument and carries an idempotency key. The
//! trade direction is decided from market mood, not from the raw action.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_SYMBOL_LEN: usize = 20;
const MAX_ACTION_LEN: usize = 32;
const MAX_CORRELATION_ID_LEN: usize = 128;
const MAX_CLOCK_SKEW_MINUTES: i64 = 5;
/// One satoshi-scale unit; anything finer is not a tradable price.
const MIN_REFERENCE_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// Validation failures for inbound payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalValidationError {
    #[error("missing field: {0}")]
    Missing(&'static str),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Raw payload as received from the ingestion surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalPayload {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub source: String,
    /// RFC 3339 timestamp; defaults to receipt time when omitted
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub correlation_id: String,
    /// Optional price hint used for sizing instead of a venue quote
    #[serde(default)]
    pub reference_price: Option<Decimal>,
}

impl SignalPayload {
    /// Validates and normalizes the payload into a [`TradingSignal`].
    ///
    /// # Errors
    /// Returns the first validation failure found.
    pub fn validate(self) -> Result<TradingSignal, SignalValidationError> {
        self.validate_at(Utc::now())
    }

    /// Same as [`validate`](Self::validate) with an explicit clock.
    ///
    /// # Errors
    /// Returns the first validation failure found.
    pub fn validate_at(self, now: DateTime<Utc>) -> Result<TradingSignal, SignalValidationError> {
        let symbol = normalize_symbol(&self.symbol)?;

        let action = self.action.trim();
        if action.is_empty() {
            return Err(SignalValidationError::Missing("action"));
        }
        if action.len() > MAX_ACTION_LEN {
            return Err(SignalValidationError::InvalidField {
                field: "action",
                reason: format!("longer than {MAX_ACTION_LEN} characters"),
            });
        }

        let source = self.source.trim();
        if source.is_empty() {
            return Err(SignalValidationError::Missing("source"));
        }

        let correlation_id = self.correlation_id.trim();
        if correlation_id.is_empty() {
            return Err(SignalValidationError::Missing("correlation_id"));
        }
        if correlation_id.len() > MAX_CORRELATION_ID_LEN {
            return Err(SignalValidationError::InvalidField {
                field: "correlation_id",
                reason: format!("longer than {MAX_CORRELATION_ID_LEN} characters"),
            });
        }

        let emitted_at = match self.timestamp.as_deref().map(str::trim) {
            None | Some("") => now,
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map_err(|e| SignalValidationError::InvalidTimestamp(format!("{raw}: {e}")))?
                .with_timezone(&Utc),
        };
        if emitted_at > now + Duration::minutes(MAX_CLOCK_SKEW_MINUTES) {
            return Err(SignalValidationError::InvalidTimestamp(format!(
                "{emitted_at} is in the future"
            )));
        }

        if let Some(price) = self.reference_price {
            if price <= Decimal::ZERO {
                return Err(SignalValidationError::InvalidField {
                    field: "reference_price",
                    reason: "must be positive".to_string(),
                });
            }
            if price < MIN_REFERENCE_PRICE {
                return Err(SignalValidationError::InvalidField {
                    field: "reference_price",
                    reason: format!("must be at least {MIN_REFERENCE_PRICE}"),
                });
            }
        }

        Ok(TradingSignal {
            symbol,
            action: action.to_ascii_uppercase(),
            source: source.to_string(),
            emitted_at,
            received_at: now,
            correlation_id: correlation_id.to_string(),
            reference_price: self.reference_price,
        })
    }
}

fn normalize_symbol(raw: &str) -> Result<String, SignalValidationError> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        return Err(SignalValidationError::Missing("symbol"));
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(SignalValidationError::InvalidSymbol(format!(
            "{symbol} is longer than {MAX_SYMBOL_LEN} characters"
        )));
    }
    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '_'));
    if !valid || !symbol.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(SignalValidationError::InvalidSymbol(symbol.to_string()));
    }
    Ok(symbol.to_ascii_uppercase())
}

/// A validated inbound signal. `correlation_id` is the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: String,
    /// Raw action as sent by the source, kept for audit only
    pub action: String,
    pub source: String,
    pub emitted_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub correlation_id: String,
    pub reference_price: Option<Decimal>,
}
