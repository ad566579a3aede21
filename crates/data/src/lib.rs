//! Persistence for the signal pipeline.
//!
//! This crate provides:
//! - `PostgreSQL` connection setup with embedded migrations
//! - Repositories implementing the core store traits
//! - In-memory stores for tests and database-less runs

pub mod database;
pub mod memory;
pub mod models;
pub mod repositories;

use std::time::Duration;

pub use database::connect;
pub use memory::{
    InMemoryAuditLog, InMemoryBalanceStore, InMemoryDecisionLog, InMemoryUserDirectory,
    StaticKeyValidator,
};
pub use repositories::{
    BalanceRepository, DecisionRepository, ExecutionRepository, KeyValidationRepository,
    Repositories, UserRepository,
};

/// How long a `PENDING` decision claim is honoured before redelivery may take it over.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(300);
