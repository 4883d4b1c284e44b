//! Claims domain errors
//!
//! Every failed transition attempt resolves to exactly one of these kinds.
//! Only `VersionConflict` is ever retried, and only by the service loop
//! after re-reading fresh state.

use thiserror::Error;

use core_kernel::{MoneyError, PortError};
use crate::claim::ClaimStatus;

/// Errors that can occur in the claims domain
#[derive(Debug, Error)]
pub enum ClaimError {
    /// Malformed or missing input the caller can correct
    #[error("Validation error: {0}")]
    Validation(String),

    /// The actor lacks the role or ownership required for the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No claim exists with the given identifier
    #[error("Claim not found: {0}")]
    NotFound(String),

    /// The action is illegal for the claim's current status
    #[error("Cannot {action} a claim in status {status}")]
    InvalidState { status: ClaimStatus, action: String },

    /// Concurrent writers kept winning the race until the retry bound ran out
    #[error("Claim {claim_id} was modified concurrently; gave up after {attempts} attempts")]
    VersionConflict { claim_id: String, attempts: u32 },

    /// The storage collaborator failed
    #[error("Claim store error: {0}")]
    Store(PortError),
}

/// Message category a caller uses to tell failures apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fix your input
    FixInput,
    /// You are not allowed
    NotAllowed,
    /// The claim does not exist
    NotFound,
    /// The claim moved on; refresh and reconsider
    Conflict,
    /// Transient race or outage; try again
    TryAgain,
    /// Persistent collaborator failure
    Unavailable,
}

impl ClaimError {
    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ClaimError::Validation(message.into())
    }

    /// Creates a Forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        ClaimError::Forbidden(message.into())
    }

    /// Creates a NotFound error from any ID type
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        ClaimError::NotFound(id.to_string())
    }

    /// Creates an InvalidState error
    pub fn invalid_state(status: ClaimStatus, action: impl Into<String>) -> Self {
        ClaimError::InvalidState {
            status,
            action: action.into(),
        }
    }

    /// Returns the user-facing category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClaimError::Validation(_) => ErrorCategory::FixInput,
            ClaimError::Forbidden(_) => ErrorCategory::NotAllowed,
            ClaimError::NotFound(_) => ErrorCategory::NotFound,
            ClaimError::InvalidState { .. } => ErrorCategory::Conflict,
            ClaimError::VersionConflict { .. } => ErrorCategory::TryAgain,
            ClaimError::Store(e) if e.is_transient() => ErrorCategory::TryAgain,
            ClaimError::Store(_) => ErrorCategory::Unavailable,
        }
    }

    /// Returns true for business-rule failures that must never be retried
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ClaimError::Validation(_)
                | ClaimError::Forbidden(_)
                | ClaimError::NotFound(_)
                | ClaimError::InvalidState { .. }
        )
    }
}

impl From<PortError> for ClaimError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { id, .. } => ClaimError::NotFound(id),
            PortError::Validation { message, .. } => ClaimError::Validation(message),
            PortError::VersionConflict { id, .. } => ClaimError::VersionConflict {
                claim_id: id,
                attempts: 1,
            },
            other => ClaimError::Store(other),
        }
    }
}

impl From<MoneyError> for ClaimError {
    fn from(error: MoneyError) -> Self {
        ClaimError::Validation(error.to_string())
    }
}
