//! Short-lived cache in front of the key validator.

use async_trait::async_trait;
use parking_lot::Mutex;
use pulse_trade_core::{ExchangeKeyValidation, KeyValidator, ServiceError, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Caches VALID results for `ttl`. Any other status, and any error, is
/// re-checked on the next call so a fixed key is picked up immediately.
pub struct CachedKeyValidator {
    inner: Arc<dyn KeyValidator>,
    ttl: Duration,
    entries: Mutex<HashMap<(UserId, String), (Instant, ExchangeKeyValidation)>>,
}

impl CachedKeyValidator {
    #[must_use]
    pub fn new(inner: Arc<dyn KeyValidator>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drops the cached entry for one user/exchange.
    pub fn invalidate(&self, user_id: UserId, exchange: &str) {
        self.entries.lock().remove(&(user_id, exchange.to_string()));
    }
}

#[async_trait]
impl KeyValidator for CachedKeyValidator {
    async fn validate(
        &self,
        user_id: UserId,
        exchange: &str,
    ) -> Result<ExchangeKeyValidation, ServiceError> {
        let key = (user_id, exchange.to_string());
        {
            let mut entries = self.entries.lock();
            if let Some((stored_at, validation)) = entries.get(&key) {
                if stored_at.elapsed() < self.ttl {
                    return Ok(validation.clone());
                }
                entries.remove(&key);
            }
        }

        let validation = self.inner.validate(user_id, exchange).await?;
        if validation.is_valid() && !self.ttl.is_zero() {
            self.entries
                .lock()
                .insert(key, (Instant::now(), validation.clone()));
        }
        Ok(validation)
    }
}
