//! Engine-level error umbrella.

use argos_core::errors::error_code::ArgosErrorCode;
use argos_core::errors::{CiError, ParseError, RunnerError, StoreError};

/// Any failure that can surface from an engine operation. Component
/// errors keep their own taxonomy; this enum only carries them across
/// the pipeline boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Ci(#[from] CiError),
}

impl ArgosErrorCode for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
            Self::Parse(e) => e.error_code(),
            Self::Runner(e) => e.error_code(),
            Self::Ci(e) => e.error_code(),
        }
    }
}
