//! Error types for the formula debugger
//!
//! Messages are meant to be shown to the person authoring a script, so they
//! say what went wrong and, where possible, how to fix it.

use std::io;
use thiserror::Error;

use crate::interp::RuntimeError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the formula debugger
#[derive(Error, Debug)]
pub enum Error {
    // === Initialization Errors ===
    #[error("Program is empty. Write a script before starting the debugger")]
    EmptyProgram,

    #[error("Failed to parse program: {message}")]
    ParseFailed { message: String },

    // === Execution Errors ===
    #[error("Execution error: {0}")]
    Execution(#[from] RuntimeError),

    #[error("Stopped after {0} steps without reaching a view() breakpoint. Check for an infinite loop")]
    StepCeilingExceeded(usize),

    // === Session Errors ===
    #[error("No debug session active. Refresh the session with a program first")]
    SessionNotActive,

    #[error("Cannot {action} while session is {state}")]
    InvalidState { action: String, state: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a file read error for `path`
    pub fn file_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Whether the error ends forward progress of the session
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::StepCeilingExceeded(_) | Self::InvalidState { .. })
    }
}

impl From<crate::interp::ParseError> for Error {
    fn from(e: crate::interp::ParseError) -> Self {
        Self::ParseFailed {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::RuntimeError;

    #[test]
    fn test_fatal_errors() {
        assert!(!Error::StepCeilingExceeded(10).is_fatal());
        assert!(!Error::invalid_state("step", "error").is_fatal());
        assert!(Error::Execution(RuntimeError::NotDefined("x".to_string())).is_fatal());
        assert!(Error::EmptyProgram.is_fatal());
    }
}
