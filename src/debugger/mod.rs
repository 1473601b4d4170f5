//! Step debugger core
//!
//! Leaves first: the scope resolver and variable collector read a stack
//! snapshot, the breakpoint module recognizes `view()` calls, the step
//! engine owns the interpreter, and the session ties them together with the
//! execution history and auto-play.

pub mod autoplay;
pub mod breakpoint;
pub mod collector;
pub mod engine;
pub mod events;
pub mod history;
pub mod resolver;
pub mod session;

pub use breakpoint::{ViewDeclaration, ViewPair};
pub use engine::{Environment, StepEngine};
pub use events::{BreakpointHit, SessionEvent};
pub use history::{ExecutionHistory, Snapshot, SourceRange};
pub use session::{DebugSession, SessionState, StepOutcome, MAX_BREAKPOINT_STEPS};

/// Parse an environment from JSON text; must be an object
pub fn parse_environment(text: &str) -> crate::common::Result<Environment> {
    match serde_json::from_str::<serde_json::Value>(text)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(crate::common::Error::Config(format!(
            "environment must be a JSON object, got {}",
            match other {
                serde_json::Value::Null => "null",
                serde_json::Value::Bool(_) => "a boolean",
                serde_json::Value::Number(_) => "a number",
                serde_json::Value::String(_) => "a string",
                serde_json::Value::Array(_) => "an array",
                serde_json::Value::Object(_) => "an object",
            }
        ))),
    }
}
