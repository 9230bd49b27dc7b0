//! Assembly of the single response record returned for a submission.

use super::error::PipelineError;
use crate::sandbox::{ExecutionResult, SANDBOX_FAULT_MESSAGE};
use crate::syntax::{Diagnostic, Program};
use crate::transform::TransformedProgram;
use serde::{Serialize, Serializer};

/// The execution part of a completed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Captured output lines, in order.
    pub logs: Vec<String>,
    /// `false` when the sandbox timed out or faulted.
    pub execution_success: bool,
    /// Why the sandbox could not finish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExecutionResult> for ExecutionReport {
    fn from(result: ExecutionResult) -> Self {
        Self {
            logs: result.logs,
            execution_success: result.success,
            error: result.error,
        }
    }
}

/// Outcome of [`Pipeline::submit`](super::Pipeline::submit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResponse {
    /// The program parsed, transformed and ran (successfully or not).
    Completed {
        /// What running the program produced.
        result: ExecutionReport,
        /// Pretty JSON of the parsed syntax tree, when enabled.
        ast: Option<String>,
        /// Source text generated from the transformed tree.
        transformed_code: String,
    },
    /// The submission stopped before execution.
    Failed {
        /// Public message (`"Parsing error: ..."` and so on).
        message: String,
        /// Extra detail, such as a request decoding error.
        error: Option<String>,
        /// Location of a parse or transform failure.
        diagnostic: Option<Diagnostic>,
    },
}

impl PipelineResponse {
    /// Response for a submission rejected with `error`.
    pub fn failed(error: &PipelineError) -> Self {
        PipelineResponse::Failed {
            message: error.to_string(),
            error: error.detail().map(str::to_string),
            diagnostic: error.diagnostic().cloned(),
        }
    }

    /// `success` as reported on the wire.
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResponse::Completed { .. })
    }

    /// The execution record of a completed response.
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            PipelineResponse::Completed { result, .. } => Some(result),
            PipelineResponse::Failed { .. } => None,
        }
    }

    /// The public message of a failed response.
    pub fn message(&self) -> Option<&str> {
        match self {
            PipelineResponse::Failed { message, .. } => Some(message),
            PipelineResponse::Completed { .. } => None,
        }
    }
}

/// Flat wire shape shared by both variants.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Wire<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ExecutionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ast: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transformed_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostic: Option<&'a Diagnostic>,
}

impl Serialize for PipelineResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            PipelineResponse::Completed {
                result,
                ast,
                transformed_code,
            } => Wire {
                success: true,
                result: Some(result),
                ast: ast.as_deref(),
                transformed_code: Some(transformed_code),
                message: None,
                error: None,
                diagnostic: None,
            },
            PipelineResponse::Failed {
                message,
                error,
                diagnostic,
            } => Wire {
                success: false,
                result: None,
                ast: None,
                transformed_code: None,
                message: Some(message),
                error: error.as_deref(),
                diagnostic: diagnostic.as_ref(),
            },
        };
        wire.serialize(serializer)
    }
}

/// Merge the stage outcomes into one response.
///
/// A parse failure wins over everything after it, then a transform failure.
/// Missing later stages after successful earlier ones are reported as a
/// sandbox fault.
pub fn assemble(
    parsed: Result<&Program, &Diagnostic>,
    transformed: Option<Result<&TransformedProgram, &Diagnostic>>,
    execution: Option<ExecutionResult>,
    include_ast: bool,
) -> PipelineResponse {
    let program = match parsed {
        Ok(program) => program,
        Err(diagnostic) => return PipelineResponse::failed(&PipelineError::Parse(diagnostic.clone())),
    };
    let transformed = match transformed {
        Some(Ok(transformed)) => transformed,
        Some(Err(diagnostic)) => {
            return PipelineResponse::failed(&PipelineError::Transform(diagnostic.clone()));
        }
        None => return fault(),
    };
    let Some(execution) = execution else {
        return fault();
    };
    let ast = if include_ast {
        match serde_json::to_string_pretty(program) {
            Ok(ast) => Some(ast),
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize syntax tree");
                None
            }
        }
    } else {
        None
    };
    PipelineResponse::Completed {
        result: execution.into(),
        ast,
        transformed_code: transformed.code.clone(),
    }
}

fn fault() -> PipelineResponse {
    PipelineResponse::Failed {
        message: SANDBOX_FAULT_MESSAGE.to_string(),
        error: None,
        diagnostic: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::ExecutionState;
    use crate::syntax::{Phase, parse_program};
    use crate::transform::{TransformOptions, transform};
    use std::time::Duration;

    fn executed(logs: &[&str]) -> ExecutionResult {
        ExecutionResult {
            logs: logs.iter().map(|line| line.to_string()).collect(),
            success: true,
            error: None,
            state: ExecutionState::Completed,
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn parse_failures_short_circuit() {
        let diagnostic = Diagnostic::new(Phase::Parse, "Unexpected end of input", 1, 4, 3);
        let response = assemble(Err(&diagnostic), None, None, true);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Parsing error: Unexpected end of input (line 1, column 4)");
        assert_eq!(json["diagnostic"]["phase"], "parse");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn completed_responses_use_camel_case() {
        let program = parse_program("print(1 + 2);").unwrap();
        let transformed = transform(&program, &TransformOptions::default()).unwrap();
        let response = assemble(Ok(&program), Some(Ok(&transformed)), Some(executed(&["3"])), false);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["logs"][0], "3");
        assert_eq!(json["result"]["executionSuccess"], true);
        assert!(json["result"].get("error").is_none());
        assert!(json.get("ast").is_none());
        assert_eq!(json["transformedCode"], transformed.code.as_str());
    }

    #[test]
    fn missing_execution_is_a_fault() {
        let program = parse_program("1;").unwrap();
        let transformed = transform(&program, &TransformOptions::default()).unwrap();
        let response = assemble(Ok(&program), Some(Ok(&transformed)), None, true);
        assert_eq!(response.message(), Some(SANDBOX_FAULT_MESSAGE));
    }
}
