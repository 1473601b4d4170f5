//! Scenario test runner
//!
//! Reads YAML test scenarios and drives an in-process debug session
//! through them, so assertions are made against structured session data
//! rather than printed output.

mod config;
mod runner;

pub use config::*;
pub use runner::{run_scenario, TestResult};
