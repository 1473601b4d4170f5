//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::debugger::{SessionState, StepOutcome};

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// The script under test
    pub target: TargetConfig,
    /// The sequence of test steps to execute
    pub steps: Vec<TestStep>,
}

/// The script and environment for a scenario
#[derive(Deserialize, Debug)]
pub struct TargetConfig {
    /// Inline script source
    pub program: Option<String>,
    /// Script file, relative to the scenario file
    pub program_file: Option<PathBuf>,
    /// Environment bound as globals
    #[serde(default)]
    pub env: serde_json::Map<String, serde_json::Value>,
}

/// A single test step in the execution flow
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Take one or more manual steps
    Step {
        /// Number of steps (default: 1)
        count: Option<usize>,
        /// Expectations for the last step
        expect: Option<StepExpectation>,
    },
    /// Run to the next view() breakpoint
    StepToBreakpoint {
        expect: Option<StepExpectation>,
    },
    /// Re-highlight the previous snapshot
    StepBack {
        /// Expected highlighted source text
        highlights: Option<String>,
    },
    /// Restart the session, optionally with a different program
    Refresh {
        program: Option<String>,
        expect: Option<StepExpectation>,
    },
    /// Check the session state
    ExpectState {
        state: SessionState,
        /// Expected number of snapshots
        history_len: Option<usize>,
    },
    /// Check the latest snapshot's variables
    InspectVariables {
        asserts: Vec<VariableAssertion>,
    },
    /// Check the most recent breakpoint hit
    InspectBreakpoint {
        /// Expected `[name, label]` pairs in order
        pairs: Option<Vec<(String, String)>>,
        /// Expected values by name
        values: Option<BTreeMap<String, serde_json::Value>>,
    },
    /// Check captured console output
    CheckOutput {
        /// Expected substring in any line
        contains: Option<String>,
        /// Expected lines, exactly
        equals: Option<Vec<String>>,
    },
}

/// Expectations for a stepping action
#[derive(Deserialize, Debug, Default)]
pub struct StepExpectation {
    /// Whether the action should succeed (default: true)
    pub success: Option<bool>,
    /// Expected outcome of the action
    pub outcome: Option<StepOutcome>,
    /// Expected substring of the error message
    pub error_contains: Option<String>,
}

/// Assertion for a variable
#[derive(Deserialize, Debug)]
pub struct VariableAssertion {
    /// Variable name to check
    pub name: String,
    /// Expected value (exact match)
    pub value: Option<serde_json::Value>,
    /// Expected substring of the value's JSON text
    pub value_contains: Option<String>,
    /// Whether the variable should be missing
    #[serde(default)]
    pub absent: bool,
}
