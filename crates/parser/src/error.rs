//! Diagnostics and error types.
//!
//! Parse errors are fatal to a compilation unit; semantic diagnostics are
//! reported but never stop the pipeline. Both travel as [`Diagnostic`]
//! values, accumulated per stage.

use thiserror::Error;

/// A positioned message from the lexer, parser, or analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Diagnostic {
            message: message.into(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum BreezeError {
    #[error("parsing failed with {} error(s)", .0.len())]
    Parse(Vec<Diagnostic>),

    #[error("failed to load package {path}: {reason}")]
    Introspection { path: String, reason: String },
}

pub type BreezeResult<T> = Result<T, BreezeError>;
