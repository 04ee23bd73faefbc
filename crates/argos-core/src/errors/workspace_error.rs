//! `.anvil/` workspace errors.

use super::error_code::{self, ArgosErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace is locked ({operation}): {message}")]
    Locked { operation: String, message: String },

    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArgosErrorCode for WorkspaceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Locked { .. } => error_code::WORKSPACE_LOCKED,
            Self::Io(_) => error_code::WORKSPACE_IO,
        }
    }
}
