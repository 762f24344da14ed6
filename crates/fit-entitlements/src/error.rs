//! Error types for entitlement writes and policy lookups

use fit_common::{MemberId, TierId, ValidationError};
use thiserror::Error;

/// Entitlement error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    /// Write rejected, nothing persisted
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Tier missing, inactive, or without a stored policy
    #[error("policy not found for {0}")]
    PolicyNotFound(TierId),

    /// Member unknown to the directory
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),
}

impl EntitlementError {
    /// Offending field for validation failures
    pub fn field(&self) -> Option<&str> {
        match self {
            EntitlementError::Validation(err) => Some(&err.field),
            _ => None,
        }
    }
}

/// Result type for entitlement operations
pub type EntitlementResult<T> = Result<T, EntitlementError>;
