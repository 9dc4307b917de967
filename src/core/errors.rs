/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use crate::process::types::ProcessError;

/// Result type for executor-level operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Executor errors with serialization support
///
/// One variant per failure class a pipeline or sandbox run can surface.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ExecutorError {
    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(executor::config),
        help("Check the stage list, argument vectors and task before running.")
    )]
    Config(String),

    #[error("Resource exhausted: {0}")]
    #[diagnostic(
        code(executor::resource),
        help("The pipe or process table may be full. Close descriptors or reap processes and retry.")
    )]
    Resource(String),

    #[error("Cannot execute '{program}': {reason}")]
    #[diagnostic(
        code(executor::exec),
        help("Make sure the program exists on PATH and is executable.")
    )]
    Exec { program: String, reason: String },

    #[error("Deadline of {deadline:?} elapsed")]
    #[diagnostic(
        code(executor::timeout),
        help("The task was killed and reaped. Raise the deadline or use 0 for none.")
    )]
    Timeout { deadline: Duration },

    #[error("Wait failed: {0}")]
    #[diagnostic(
        code(executor::wait),
        help("An unexpected error occurred while reaping a child process.")
    )]
    Wait(String),

    #[error("Stage {index} ('{program}') failed: {detail}")]
    #[diagnostic(code(executor::stage_failed))]
    StageFailed {
        index: usize,
        program: String,
        detail: String,
    },
}

impl ExecutorError {
    /// Short machine-readable class name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Resource(_) => "resource",
            Self::Exec { .. } => "exec",
            Self::Timeout { .. } => "timeout",
            Self::Wait(_) => "wait",
            Self::StageFailed { .. } => "stage_failed",
        }
    }
}

impl From<ProcessError> for ExecutorError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::InvalidArgument(msg) => ExecutorError::Config(msg),
            ProcessError::Pipe(_) | ProcessError::Fork(_) => {
                ExecutorError::Resource(err.to_string())
            }
            ProcessError::Wait { .. } => ExecutorError::Wait(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn test_process_error_mapping() {
        let fork = ExecutorError::from(ProcessError::Fork(Errno::EAGAIN));
        assert_eq!(fork.kind(), "resource");

        let pipe = ExecutorError::from(ProcessError::Pipe(Errno::EMFILE));
        assert_eq!(pipe.kind(), "resource");

        let arg = ExecutorError::from(ProcessError::InvalidArgument("nul byte".into()));
        assert_eq!(arg, ExecutorError::Config("nul byte".into()));

        let wait = ExecutorError::from(ProcessError::Wait {
            pid: 42,
            errno: Errno::ECHILD,
        });
        assert_eq!(wait.kind(), "wait");
        assert!(wait.to_string().contains("42"));
    }

    #[test]
    fn test_error_serialization_is_tagged() {
        let err = ExecutorError::Timeout {
            deadline: Duration::from_secs(2),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"error_type\":\"timeout\""));

        let back: ExecutorError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
