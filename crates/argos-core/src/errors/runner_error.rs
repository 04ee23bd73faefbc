//! Runner-adapter errors.
//!
//! Test failures are NOT errors: they are successful executions with FAILED
//! rows. These kinds cover spawn problems, timeouts, and nonzero exits not
//! attributable to failing tests.

use super::error_code::{self, ArgosErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to spawn runner: {message}")]
    Spawn { message: String },

    #[error("runner exceeded wall-clock ceiling of {seconds}s")]
    Timeout { seconds: u64 },

    #[error("runner exited with code {exit_code}: {stderr_excerpt}")]
    Failed { exit_code: i32, stderr_excerpt: String },

    #[error("runner produced no report at {path}")]
    MissingReport { path: String },

    #[error("execution cancelled")]
    Cancelled,
}

impl ArgosErrorCode for RunnerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => error_code::RUNNER_SPAWN,
            Self::Timeout { .. } => error_code::RUNNER_TIMEOUT,
            Self::Failed { .. } => error_code::RUNNER_FAILED,
            Self::MissingReport { .. } => error_code::RUNNER_MISSING_REPORT,
            Self::Cancelled => error_code::RUNNER_CANCELLED,
        }
    }
}
