//! # Error Types
//!
//! Domain-specific error types for kassa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kassa-core errors (this file)                                          │
//! │  ├── CoreError        - State-machine and parsing failures              │
//! │  ├── ValidationError  - Input validation failures                       │
//! │  ├── PaymentError     - Ledger rejections (ledger module)               │
//! │  └── CardError        - Card state rejections (card module)             │
//! │                                                                         │
//! │  kassa-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  kassa-engine errors (separate crate)                                   │
//! │  └── EngineError      - Wraps all of the above for service callers      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derives, never manual impls
//! 2. Context in the message (job id, status, field)
//! 3. Errors are enum variants, never bare strings

use thiserror::Error;

use crate::card::CardError;
use crate::ledger::PaymentError;
use crate::types::JobStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors: illegal state-machine transitions and malformed
/// device payloads.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A job transition guard refused the operation.
    ///
    /// ## When This Occurs
    /// - Picking up a job that is already processing (concurrent pollers)
    /// - Completing a job that already completed (double fiscalization)
    /// - Retrying a job with exhausted budget or a non-retriable failure
    #[error("job {job_id} is {status:?}, cannot {action}")]
    InvalidJobTransition {
        job_id: String,
        status: JobStatus,
        action: String,
    },

    /// The device's shift-status payload could not be understood.
    #[error("shift report parse failed: {reason}")]
    ShiftReportParse { reason: String },

    /// A ledger payment was rejected (overpayment, non-positive).
    #[error("payment rejected: {0}")]
    Payment(#[from] PaymentError),

    /// A card operation was rejected.
    #[error("card operation rejected: {0}")]
    Card(#[from] CardError),

    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    /// Invalid format (bad prefix, bad id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: &'static str, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_message() {
        let err = CoreError::InvalidJobTransition {
            job_id: "job-1".into(),
            status: JobStatus::Completed,
            action: "complete".into(),
        };
        assert_eq!(err.to_string(), "job job-1 is Completed, cannot complete");
    }

    #[test]
    fn test_payment_error_converts() {
        let err: CoreError = PaymentError::NonPositiveAmount.into();
        assert!(matches!(err, CoreError::Payment(_)));
    }

    #[test]
    fn test_validation_error_message() {
        let err = ValidationError::Required { field: "tenant_id" };
        assert_eq!(err.to_string(), "tenant_id is required");
    }
}
