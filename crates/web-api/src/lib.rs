pub mod error;
pub mod handlers;
pub mod health;
pub mod server;

pub use error::ApiError;
pub use health::{HealthPolicy, HealthResponse, HealthStatus, SourceHealth};
pub use server::{ApiServer, AppState};
