//! In-memory implementations of the store traits.
//!
//! Used by tests and by runs without a configured database. State lives
//! behind `parking_lot` locks and is lost on drop.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use pulse_trade_core::{
    AuditLog, BalanceAccount, BalanceStore, Claim, DecisionLog, DirectionDecision,
    ExchangeKeyValidation, KeyStatus, KeyValidator, LedgerEntry, OrderExecutionRecord,
    ServiceError, StoreError, TradingSignal, User, UserDirectory, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::DEFAULT_CLAIM_TIMEOUT;

// ============================================
// Balances
// ============================================

#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    accounts: RwLock<HashMap<UserId, BalanceAccount>>,
    ledger: Mutex<Vec<LedgerEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryBalanceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, account: BalanceAccount) {
        self.accounts.write().insert(account.user_id, account);
    }

    /// Ledger entries for one user, in commit order.
    #[must_use]
    pub fn ledger(&self, user_id: UserId) -> Vec<LedgerEntry> {
        self.ledger
            .lock()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("balance store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn load(&self, user_id: UserId) -> Result<Option<BalanceAccount>, StoreError> {
        self.check()?;
        Ok(self.accounts.read().get(&user_id).cloned())
    }

    async fn commit(
        &self,
        account: &BalanceAccount,
        entries: &[LedgerEntry],
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut accounts = self.accounts.write();
        let mut ledger = self.ledger.lock();
        accounts.insert(account.user_id, account.clone());
        ledger.extend_from_slice(entries);
        Ok(())
    }
}

// ============================================
// Decisions
// ============================================

#[derive(Debug, Clone)]
enum Slot {
    Pending {
        claimed_at: Instant,
    },
    Decided {
        signal: Box<TradingSignal>,
        decision: Box<DirectionDecision>,
    },
}

#[derive(Debug)]
pub struct InMemoryDecisionLog {
    slots: Mutex<HashMap<String, Slot>>,
    order: Mutex<Vec<String>>,
    claim_timeout: Duration,
}

impl Default for InMemoryDecisionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDecisionLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        }
    }

    /// Pending claims older than `timeout` are taken over by the next claim.
    #[must_use]
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }

    /// Completed decisions in completion order.
    #[must_use]
    pub fn decisions(&self) -> Vec<DirectionDecision> {
        let slots = self.slots.lock();
        self.order
            .lock()
            .iter()
            .filter_map(|cid| match slots.get(cid) {
                Some(Slot::Decided { decision, .. }) => Some(decision.as_ref().clone()),
                _ => None,
            })
            .collect()
    }

    /// Signal stored alongside a completed decision.
    #[must_use]
    pub fn signal(&self, correlation_id: &str) -> Option<TradingSignal> {
        match self.slots.lock().get(correlation_id) {
            Some(Slot::Decided { signal, .. }) => Some(signal.as_ref().clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_pending(&self, correlation_id: &str) -> bool {
        matches!(self.slots.lock().get(correlation_id), Some(Slot::Pending { .. }))
    }
}

#[async_trait]
impl DecisionLog for InMemoryDecisionLog {
    async fn claim(&self, correlation_id: &str) -> Result<Claim, StoreError> {
        let mut slots = self.slots.lock();
        Ok(match slots.get(correlation_id) {
            Some(Slot::Decided { decision, .. }) => Claim::Existing(decision.clone()),
            Some(Slot::Pending { claimed_at }) if claimed_at.elapsed() < self.claim_timeout => {
                Claim::InFlight
            }
            Some(Slot::Pending { .. }) => {
                tracing::warn!("Taking over stale claim for {}", correlation_id);
                slots.insert(
                    correlation_id.to_string(),
                    Slot::Pending {
                        claimed_at: Instant::now(),
                    },
                );
                Claim::Claimed
            }
            None => {
                slots.insert(
                    correlation_id.to_string(),
                    Slot::Pending {
                        claimed_at: Instant::now(),
                    },
                );
                Claim::Claimed
            }
        })
    }

    async fn complete(
        &self,
        signal: &TradingSignal,
        decision: &DirectionDecision,
    ) -> Result<(), StoreError> {
        let cid = decision.correlation_id();
        let mut slots = self.slots.lock();
        match slots.get(cid) {
            Some(Slot::Pending { .. }) => {
                slots.insert(
                    cid.to_string(),
                    Slot::Decided {
                        signal: Box::new(signal.clone()),
                        decision: Box::new(decision.clone()),
                    },
                );
                self.order.lock().push(cid.to_string());
                Ok(())
            }
            Some(Slot::Decided { .. }) => {
                Err(StoreError::Conflict(format!("{cid} already decided")))
            }
            None => Err(StoreError::Conflict(format!("no pending claim for {cid}"))),
        }
    }

    async fn release(&self, correlation_id: &str) -> Result<(), StoreError> {
        let mut slots = self.slots.lock();
        if matches!(slots.get(correlation_id), Some(Slot::Pending { .. })) {
            slots.remove(correlation_id);
        }
        Ok(())
    }

    async fn get(&self, correlation_id: &str) -> Result<Option<DirectionDecision>, StoreError> {
        Ok(match self.slots.lock().get(correlation_id) {
            Some(Slot::Decided { decision, .. }) => Some(decision.as_ref().clone()),
            _ => None,
        })
    }
}

// ============================================
// Execution audit
// ============================================

#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<OrderExecutionRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<OrderExecutionRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn records_for(&self, correlation_id: &str) -> Vec<OrderExecutionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn record_execution(&self, record: &OrderExecutionRecord) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit log offline".to_string()));
        }
        let mut records = self.records.lock();
        let duplicate = records
            .iter()
            .any(|r| r.correlation_id == record.correlation_id && r.user_id == record.user_id);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "execution already recorded for {} / user {}",
                record.correlation_id, record.user_id
            )));
        }
        records.push(record.clone());
        Ok(())
    }
}

// ============================================
// Users and keys
// ============================================

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub fn set_users(&self, users: Vec<User>) {
        *self.users.write() = users;
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn active_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self
            .users
            .read()
            .iter()
            .filter(|u| u.active)
            .cloned()
            .collect())
    }
}

/// Key validator answering from a fixed table.
#[derive(Debug)]
pub struct StaticKeyValidator {
    statuses: RwLock<HashMap<(UserId, String), KeyStatus>>,
    default_status: KeyStatus,
    calls: AtomicUsize,
}

impl StaticKeyValidator {
    #[must_use]
    pub fn new(default_status: KeyStatus) -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
            default_status,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_status(self, user_id: UserId, exchange: &str, status: KeyStatus) -> Self {
        self.set_status(user_id, exchange, status);
        self
    }

    pub fn set_status(&self, user_id: UserId, exchange: &str, status: KeyStatus) {
        self.statuses
            .write()
            .insert((user_id, exchange.to_string()), status);
    }

    /// Number of `validate` calls served.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValidator for StaticKeyValidator {
    async fn validate(
        &self,
        user_id: UserId,
        exchange: &str,
    ) -> Result<ExchangeKeyValidation, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .statuses
            .read()
            .get(&(user_id, exchange.to_string()))
            .copied()
            .unwrap_or(self.default_status);
        Ok(ExchangeKeyValidation {
            user_id,
            exchange: exchange.to_string(),
            status,
            validated_at: Some(Utc::now()),
        })
    }
}
