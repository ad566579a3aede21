//! Error types shared by every collaborator boundary.
//!
//! `ServiceError` covers outbound calls (sentiment feeds, AI classifier,
//! exchange gateway, key validator). `StoreError` covers persistence.
//! Both carry enough classification for the retry policy and for the
//! fatal/non-fatal split in the decision cycle.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by outbound collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },

    /// Non-success HTTP status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from API.
        message: String,
    },

    /// Request understood but refused (bad order, bad credentials).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Response could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Collaborator is not configured or permanently unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a rate limit error.
    #[must_use]
    pub const fn rate_limit(retry_after_secs: u64) -> Self {
        Self::RateLimit { retry_after_secs }
    }

    /// Returns true if repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Serialization(_) => true,
            Self::Api { status_code, .. } => *status_code >= 500 || *status_code == 408,
            Self::Rejected(_) | Self::Unavailable(_) => false,
        }
    }

    /// Returns the delay the remote side asked for, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }

    /// Maps a `reqwest`-style status code and body into an error.
    pub fn from_status(status_code: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status_code {
            429 => Self::rate_limit(1),
            400..=499 if status_code != 408 => Self::Rejected(format!("{status_code}: {body}")),
            _ => Self::api(status_code, body),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs may carry credentials; keep them out of messages.
        let err = err.without_url();
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors returned by persistence backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store cannot be reached. Fatal to a decision cycle.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness or optimistic-concurrency conflict.
    #[error("store conflict: {0}")]
    Conflict(String),

    /// Row not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored data could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns true when the failure means the whole store is unusable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(ServiceError::Network("reset".to_string()).is_retryable());
        assert!(ServiceError::Timeout("5s".to_string()).is_retryable());
        assert!(ServiceError::rate_limit(3).is_retryable());
        assert!(ServiceError::api(503, "down").is_retryable());
    }

    #[test]
    fn test_rejections_are_not_retryable() {
        assert!(!ServiceError::Rejected("bad qty".to_string()).is_retryable());
        assert!(!ServiceError::api(400, "bad").is_retryable());
        assert!(!ServiceError::Unavailable("no key".to_string()).is_retryable());
    }

    #[test]
    fn test_from_status_mapping() {
        assert_eq!(ServiceError::from_status(429, ""), ServiceError::rate_limit(1));
        assert!(matches!(
            ServiceError::from_status(422, "min notional"),
            ServiceError::Rejected(_)
        ));
        assert!(matches!(
            ServiceError::from_status(502, "bad gateway"),
            ServiceError::Api { status_code: 502, .. }
        ));
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        assert_eq!(
            ServiceError::rate_limit(7).retry_after(),
            Some(Duration::from_secs(7))
        );
        assert_eq!(ServiceError::Network("x".to_string()).retry_after(), None);
    }

    #[test]
    fn test_store_error_fatality() {
        assert!(StoreError::Unavailable("pool closed".to_string()).is_fatal());
        assert!(!StoreError::Conflict("dup".to_string()).is_fatal());
    }
}
