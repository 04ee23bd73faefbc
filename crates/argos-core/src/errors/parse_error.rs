//! Parser errors. Parsers are pure; a failure identifies the offending
//! fragment by line where possible.

use super::error_code::{self, ArgosErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("incomplete input: {message}")]
    Incomplete { message: String },

    #[error("unknown format: {message}")]
    UnknownFormat { message: String },
}

impl ArgosErrorCode for ParseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => error_code::PARSE_SYNTAX,
            Self::Incomplete { .. } => error_code::PARSE_INCOMPLETE,
            Self::UnknownFormat { .. } => error_code::PARSE_UNKNOWN_FORMAT,
        }
    }
}
