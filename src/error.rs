//! Error types shared across the crate.

use std::io;
use thiserror::Error;

/// Errors that can occur while sorting or checking interval files.
///
/// Every variant is fatal to the running job; there is no retry. Line
/// numbers are 1-based positions in the input stream where known.
#[derive(Error, Debug)]
pub enum SortError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("invalid input format: {0}")]
    InputFormat(String),

    #[error("unknown chromosome: {name}")]
    UnknownSequence { name: String },

    #[error("sort order violation at line {line}: {message}")]
    OrderViolation { line: u64, message: String },

    #[error("bounds violation at line {line}: {message}")]
    BoundsViolation { line: u64, message: String },

    #[error("integrity error: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, SortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = SortError::Parse {
            line: 12,
            message: "invalid start position: 'abc'".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "parse error at line 12: invalid start position: 'abc'"
        );

        let e = SortError::UnknownSequence {
            name: "chrZ".to_string(),
        };
        assert!(e.to_string().contains("chrZ"));
    }
}
