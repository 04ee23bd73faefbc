//! Storage-layer errors for SQLite operations.

use super::error_code::{self, ArgosErrorCode};

/// Errors that can occur in the storage layer.
///
/// The storage crate classifies rusqlite failures into these kinds so the
/// CLI/HTTP edges can map them (409 for constraint, 503 for busy, fatal 500
/// for corruption) without string matching.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("Migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("Database busy (another write in progress)")]
    Busy,

    #[error("Database corrupt: {details}")]
    Corruption { details: String },

    #[error("Constraint violation: {detail}")]
    Constraint { detail: String },

    #[error("Not found: {what}")]
    NotFound { what: String },
}

impl ArgosErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Busy => error_code::STORE_BUSY,
            Self::Corruption { .. } => error_code::STORE_CORRUPTION,
            Self::Constraint { .. } => error_code::STORE_CONSTRAINT,
            Self::NotFound { .. } => error_code::STORE_NOT_FOUND,
            Self::MigrationFailed { .. } => error_code::STORE_MIGRATION_FAILED,
            Self::Sqlite { .. } => error_code::STORE_ERROR,
        }
    }
}
