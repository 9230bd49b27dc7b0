//! Error types for the pipeline and its configuration.

use crate::syntax::Diagnostic;
use thiserror::Error;

/// Failures that stop a submission before execution.
///
/// Timeouts and sandbox faults are not errors at this level: they are part
/// of a completed response's execution record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The request carried no code.
    #[error("No code provided")]
    Usage,

    /// The source text did not parse.
    #[error("Parsing error: {0}")]
    Parse(Diagnostic),

    /// The transformer rejected the program.
    #[error("Transformation error: {0}")]
    Transform(Diagnostic),

    /// A request line that could not be decoded.
    #[error("Invalid request")]
    InvalidRequest(String),
}

impl PipelineError {
    /// The located diagnostic, for parse and transform failures.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            PipelineError::Parse(diagnostic) | PipelineError::Transform(diagnostic) => Some(diagnostic),
            PipelineError::Usage | PipelineError::InvalidRequest(_) => None,
        }
    }

    /// Extra detail carried next to the message.
    pub fn detail(&self) -> Option<&str> {
        match self {
            PipelineError::InvalidRequest(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `timeout_ms` was zero.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// A count limit was zero.
    #[error("limit '{0}' must be greater than zero")]
    ZeroLimit(&'static str),

    /// The worker stack cannot hold the interpreter.
    #[error("stack_size must be at least {minimum} bytes (got {actual})")]
    StackTooSmall {
        /// Smallest accepted stack.
        minimum: usize,
        /// Configured stack.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Phase;

    #[test]
    fn messages_follow_the_public_format() {
        let diagnostic = Diagnostic::new(Phase::Parse, "Unexpected token '}'", 3, 7, 20);
        assert_eq!(
            PipelineError::Parse(diagnostic.clone()).to_string(),
            "Parsing error: Unexpected token '}' (line 3, column 7)"
        );
        assert_eq!(
            PipelineError::Transform(diagnostic).to_string(),
            "Transformation error: Unexpected token '}' (line 3, column 7)"
        );
        assert_eq!(PipelineError::Usage.to_string(), "No code provided");
    }
}
