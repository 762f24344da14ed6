//! Error types for OpenFit

use thiserror::Error;

/// Rejected write, naming the offending field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed for `{field}`: {reason}")]
pub struct ValidationError {
    /// Path of the offending field, e.g. `branch_ids[2]`
    pub field: String,
    /// Human readable reason
    pub reason: String,
}

impl ValidationError {
    /// Create new validation error
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Reference to an id the catalog does not know
    pub fn unknown(field: impl Into<String>, what: impl std::fmt::Display) -> Self {
        Self::new(field, format!("unknown reference {}", what))
    }

    /// Reference to a deactivated catalog entry
    pub fn inactive(field: impl Into<String>, what: impl std::fmt::Display) -> Self {
        Self::new(field, format!("{} is inactive", what))
    }
}

/// Result type for validated writes
pub type ValidationResult<T> = Result<T, ValidationError>;
