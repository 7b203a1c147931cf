/// Outcome classification
///
/// Pure functions from captured output (and the run's terminal state) to
/// what the caller shows the user.
use crate::config::types::{ExecutionResult, ExecutionStatus};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Classified result of one execution.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// stdout parsed as JSON
    Structured(Value),
    /// stdout as trimmed text (possibly empty)
    Text(String),
    /// stderr was non-empty
    RuntimeFailure(String),
    /// Static validation refused the code
    Rejected(String),
    TimedOut(String),
    /// The sandbox could not run the code at all
    InternalError(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Structured(_) | Outcome::Text(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Structured(value) => {
                let rendered = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&rendered)
            }
            Outcome::Text(text) => f.write_str(text),
            Outcome::RuntimeFailure(stderr) => write!(f, "execution failed:\n{}", stderr),
            Outcome::Rejected(summary) => f.write_str(summary),
            Outcome::TimedOut(message) => f.write_str(message),
            Outcome::InternalError(message) => write!(f, "internal error: {}", message),
        }
    }
}

/// Outcome classifier - stateless
pub struct ResultPipeline;

impl ResultPipeline {
    /// Non-empty stderr wins over any stdout. Otherwise stdout is tried as
    /// JSON, then returned as trimmed text.
    pub fn interpret(stdout: &str, stderr: &str) -> Outcome {
        if !stderr.is_empty() {
            return Outcome::RuntimeFailure(stderr.to_string());
        }

        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Outcome::Text(String::new());
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => Outcome::Structured(value),
            Err(_) => Outcome::Text(trimmed.to_string()),
        }
    }

    /// Status-aware classification of a full result.
    pub fn interpret_result(result: &ExecutionResult) -> Outcome {
        match result.status {
            ExecutionStatus::Completed => Self::interpret(&result.stdout, &result.stderr),
            ExecutionStatus::Rejected => Outcome::Rejected(result.stderr.clone()),
            ExecutionStatus::TimedOut => Outcome::TimedOut(result.stderr.clone()),
            ExecutionStatus::SpawnFailed => Outcome::InternalError(result.stderr.clone()),
        }
    }
}
