pub mod arbiter;
pub mod selector;

pub use arbiter::{AiArbiter, Arbitration, DecisionCache, Fingerprint, GeminiClassifier, Resolution};
pub use selector::{DualStrategySelector, SelectorOutcome, SelectorState};
