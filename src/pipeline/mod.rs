//! The parse → transform → execute → assemble pipeline.
//!
//! [`Pipeline::submit`] is the single call-in. Each call runs in its own
//! tracing span keyed by a fresh invocation id and a digest of the source,
//! so log lines never carry the untrusted text itself.

pub mod config;
pub mod error;
pub mod response;

pub use config::PipelineConfig;
pub use error::{ConfigError, PipelineError};
pub use response::{ExecutionReport, PipelineResponse, assemble};

use crate::sandbox::{ExecutionState, SandboxExecutor};
use crate::syntax::parse_program;
use crate::transform::transform;
use tracing::{debug, info_span, warn};
use uuid::Uuid;

/// Short hex digest of submitted source, for log correlation.
pub fn source_digest(source: &str) -> String {
    let hash = blake3::hash(source.as_bytes());
    hash.to_hex().as_str()[..16].to_string()
}

/// Stateless pipeline; safe to share between threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    executor: SandboxExecutor,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Pipeline running with `config`.
    pub fn new(config: PipelineConfig) -> Self {
        let executor = SandboxExecutor::with_seed(config.random_seed);
        Self { config, executor }
    }

    /// The active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `source` through every stage and describe the outcome.
    ///
    /// Never panics and never returns an error: failures are part of the
    /// response. Blocks for at most the configured timeout plus the time
    /// the sandbox needs to notice the interrupt.
    pub fn submit(&self, source: &str) -> PipelineResponse {
        let invocation = Uuid::new_v4();
        let span = info_span!("pipeline", invocation = %invocation, source = %source_digest(source));
        let _entered = span.enter();

        if source.is_empty() {
            debug!("rejected empty submission");
            return PipelineResponse::failed(&PipelineError::Usage);
        }

        let parsed = parse_program(source);
        if let Err(diagnostic) = &parsed {
            debug!(line = diagnostic.line, column = diagnostic.column, "parse failed");
        }
        let transformed = parsed
            .as_ref()
            .ok()
            .map(|program| transform(program, &self.config.transform));
        match &transformed {
            Some(Ok(transformed)) => debug!(rules = ?transformed.applied, "transformed"),
            Some(Err(diagnostic)) => debug!(line = diagnostic.line, "transform failed"),
            None => {}
        }

        let execution = match &transformed {
            Some(Ok(transformed)) => {
                let result = self.executor.execute(&transformed.program, &self.config.limits);
                match result.state {
                    ExecutionState::TimedOut => warn!(elapsed = ?result.elapsed, "execution timed out"),
                    ExecutionState::Faulted => warn!(error = ?result.error, "execution faulted"),
                    _ => debug!(lines = result.logs.len(), elapsed = ?result.elapsed, "executed"),
                }
                Some(result)
            }
            _ => None,
        };

        assemble(
            parsed.as_ref(),
            transformed.as_ref().map(Result::as_ref),
            execution,
            self.config.include_ast,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_short_and_stable() {
        assert_eq!(source_digest("print(1)"), source_digest("print(1)"));
        assert_eq!(source_digest("print(1)").len(), 16);
        assert_ne!(source_digest("print(1)"), source_digest("print(2)"));
    }

    #[test]
    fn empty_code_is_a_usage_error() {
        let response = Pipeline::default().submit("");
        assert_eq!(response.message(), Some("No code provided"));
    }

    #[test]
    fn whitespace_runs_as_an_empty_program() {
        let response = Pipeline::default().submit("  \n\t ");
        let report = response.report().unwrap();
        assert!(report.execution_success);
        assert!(report.logs.is_empty());
    }
}
