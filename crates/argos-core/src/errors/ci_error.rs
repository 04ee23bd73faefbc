//! CI provider adapter errors.

use super::error_code::{self, ArgosErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum CiError {
    #[error("CI authentication failed (HTTP {status})")]
    Auth { status: u16 },

    #[error("CI rate limit still exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("CI provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("CI transport error: {message}")]
    Transport { message: String },

    #[error("artifact archive error: {message}")]
    Archive { message: String },
}

impl ArgosErrorCode for CiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Auth { .. } => error_code::CI_AUTH,
            Self::RateLimited { .. } => error_code::CI_RATE_LIMITED,
            Self::Status { .. } => error_code::CI_STATUS,
            Self::Transport { .. } => error_code::CI_TRANSPORT,
            Self::Archive { .. } => error_code::CI_ARCHIVE,
        }
    }
}
