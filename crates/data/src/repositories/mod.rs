//! `PostgreSQL` repositories.
//!
//! Each repository wraps the shared pool and implements one of the core
//! persistence traits.

pub mod balance_repo;
pub mod decision_repo;
pub mod execution_repo;
pub mod user_repo;

pub use balance_repo::BalanceRepository;
pub use decision_repo::DecisionRepository;
pub use execution_repo::ExecutionRepository;
pub use user_repo::{KeyValidationRepository, UserRepository};

use sqlx::PgPool;

/// Creates all repositories from a single database pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub decisions: DecisionRepository,
    pub executions: ExecutionRepository,
    pub balances: BalanceRepository,
    pub users: UserRepository,
    pub keys: KeyValidationRepository,
}

impl Repositories {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            decisions: DecisionRepository::new(pool.clone()),
            executions: ExecutionRepository::new(pool.clone()),
            balances: BalanceRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            keys: KeyValidationRepository::new(pool),
        }
    }
}
