//! Per-(user, symbol) execution locks.

use parking_lot::Mutex;
use pulse_trade_core::UserId;
use std::collections::HashSet;
use std::sync::Arc;

type LockKey = (UserId, String);

/// Set of (user, symbol) pairs with an order attempt in flight.
///
/// Acquisition never waits: a held pair is reported as busy and the caller
/// moves on.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLocks {
    held: Arc<Mutex<HashSet<LockKey>>>,
}

impl ExecutionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a guard, or `None` if the pair is already held.
    #[must_use]
    pub fn try_acquire(&self, user_id: UserId, symbol: &str) -> Option<ExecutionGuard> {
        let key = (user_id, symbol.to_string());
        if !self.held.lock().insert(key.clone()) {
            return None;
        }
        Some(ExecutionGuard {
            held: Arc::clone(&self.held),
            key,
        })
    }

    #[must_use]
    pub fn is_held(&self, user_id: UserId, symbol: &str) -> bool {
        self.held.lock().contains(&(user_id, symbol.to_string()))
    }

    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

/// Releases its pair on drop.
#[derive(Debug)]
pub struct ExecutionGuard {
    held: Arc<Mutex<HashSet<LockKey>>>,
    key: LockKey,
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.held.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let locks = ExecutionLocks::new();
        let guard = locks.try_acquire(1, "BTCUSDT");
        assert!(guard.is_some());
        assert!(locks.try_acquire(1, "BTCUSDT").is_none());
    }

    #[test]
    fn test_pairs_are_independent() {
        let locks = ExecutionLocks::new();
        let _a = locks.try_acquire(1, "BTCUSDT").unwrap();
        assert!(locks.try_acquire(1, "ETHUSDT").is_some());
        assert!(locks.try_acquire(2, "BTCUSDT").is_some());
    }

    #[test]
    fn test_drop_releases() {
        let locks = ExecutionLocks::new();
        {
            let _guard = locks.try_acquire(7, "SOLUSDT").unwrap();
            assert!(locks.is_held(7, "SOLUSDT"));
        }
        assert!(!locks.is_held(7, "SOLUSDT"));
        assert_eq!(locks.held_count(), 0);
    }
}
