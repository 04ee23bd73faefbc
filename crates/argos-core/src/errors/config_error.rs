//! Configuration loading errors.

use std::path::PathBuf;

use super::error_code::{self, ArgosErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {message}")]
    Syntax { path: PathBuf, message: String },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ArgosErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => error_code::CONFIG_IO,
            Self::Syntax { .. } => error_code::CONFIG_SYNTAX,
            Self::Invalid { .. } => error_code::CONFIG_INVALID,
        }
    }
}
