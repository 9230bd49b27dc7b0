//! Source text → syntax tree → source text.
//!
//! [`parse_program`] turns untrusted text into a [`Program`] or a single
//! [`Diagnostic`]; [`codegen::generate`] prints a tree back as source that
//! re-parses to the same structure.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod number;
mod parser;

pub use ast::Program;
pub use parser::{MAX_NESTING_DEPTH, MAX_TREE_HEIGHT, parse_program};

use serde::Serialize;
use std::fmt;

/// Stage that produced a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Rejected by the parser.
    Parse,
    /// Rejected by the transformer.
    Transform,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Parse => f.write_str("parse"),
            Phase::Transform => f.write_str("transform"),
        }
    }
}

/// A located, human-readable rejection of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message} (line {line}, column {column})")]
pub struct Diagnostic {
    /// Stage that rejected the input.
    pub phase: Phase,
    /// Description of the problem.
    pub message: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, in characters.
    pub column: usize,
    /// Byte offset into the source.
    #[serde(skip)]
    pub offset: usize,
}

impl Diagnostic {
    /// Build a diagnostic at a known position.
    pub fn new(
        phase: Phase,
        message: impl Into<String>,
        line: usize,
        column: usize,
        offset: usize,
    ) -> Self {
        Self {
            phase,
            message: message.into(),
            line,
            column,
            offset,
        }
    }

    /// Build a diagnostic pointing at the start of `span`.
    pub fn at(phase: Phase, message: impl Into<String>, span: ast::Span) -> Self {
        Self::new(phase, message, span.line, span.column, span.start)
    }
}
