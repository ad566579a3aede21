//! CLI commands.

pub mod balance;
pub mod decide;
pub mod run;

pub use balance::{run_balance, BalanceArgs};
pub use decide::{run_decide, DecideArgs};
pub use run::{run_service, RunArgs};

use anyhow::Result;
use pulse_trade_core::{AppConfig, ConfigLoader};

/// Loads `path`, or the profile overlay when `profile` is set.
fn load_config(path: &str, profile: Option<&str>) -> Result<AppConfig> {
    match profile {
        Some(profile) => ConfigLoader::load_with_profile(profile),
        None => ConfigLoader::load_from(path),
    }
}
