//! Decision cycle orchestration.
//!
//! - [`DecisionCycle`]: claim, decide under a deadline, log, fan out
//! - [`SignalPipeline`]: bounded queue plus worker pool over cycles
//! - [`Services`]: wiring of all components from configuration

pub mod cycle;
pub mod pipeline;
pub mod services;

pub use cycle::{CycleError, CycleOutcome, DecisionCycle};
pub use pipeline::{Acknowledgement, PipelineError, PipelineEvent, PipelineHandle, SignalPipeline};
pub use services::{Services, Stores};
