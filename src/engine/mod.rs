//! Execution engine for benchforge
//!
//! The engine orchestrates:
//! 1. Planning - Decide which pipeline steps run for a config and selection
//! 2. Executing - Run the steps in order under an error policy

pub mod executor;
pub mod planner;

use serde::Deserialize;

pub use executor::{ExecuteOptions, RunSummary, StepOutcome, execute};
pub use planner::{Decision, Plan, Selection};

/// What to do when a command inside a step exits non-zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Record the failure and keep going
    #[default]
    Continue,
    /// Stop the whole run at the first failed command
    FailFast,
}

impl ErrorPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::FailFast => "fail-fast",
        }
    }
}
