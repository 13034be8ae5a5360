//! Validation Error Types

use thiserror::Error;

/// Errors during payload validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Missing or blank required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Field present but not parseable
    #[error("Invalid {field}: {reason}")]
    InvalidFormat { field: &'static str, reason: String },

    /// Identifier longer than the store accepts
    #[error("{field} is {len} characters long, at most {max} allowed")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}
