//! Sandboxed interpreter for formula scripts
//!
//! A small JavaScript subset evaluated by an explicit frame stack, so that
//! execution can be advanced one evaluation step at a time and the stack
//! can be inspected between steps.

pub mod ast;
mod builtins;
mod lexer;
mod machine;
mod parser;
pub mod scope;
pub mod value;

use thiserror::Error;

pub use ast::{Node, NodeKind, NodeRef};
pub use machine::{ExecutionFrame, Interpreter, InterpreterOptions};
pub use parser::parse_program;
pub use scope::Scope;
pub use value::{ConversionError, JsonConverter, NativeConverter, Value};

/// Syntax error with its position in the source
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the source
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl ParseError {
    pub fn new(src: &str, offset: usize, message: impl Into<String>) -> Self {
        let prefix = src.get(..offset).unwrap_or(src);
        let line = prefix.matches('\n').count() + 1;
        let column = prefix
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count())
            .unwrap_or(0)
            + 1;
        Self {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

/// Error raised while evaluating a script
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("ReferenceError: {0} is not defined")]
    NotDefined(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("RangeError: {0}")]
    Range(String),

    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("Uncaught {0}")]
    Thrown(String),
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}
