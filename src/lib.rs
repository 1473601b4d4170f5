//! Formulize - a step debugger for formula scripts
//!
//! This library interprets a small JavaScript subset one evaluation at a
//! time, recording a snapshot of the visible variables after every step and
//! treating `view()` calls as breakpoints.

pub mod cli;
pub mod commands;
pub mod common;
pub mod debugger;
pub mod interp;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use debugger::{DebugSession, SessionEvent, SessionState, StepOutcome};
