//! # Engine Error Types
//!
//! The error surface service callers match on. Domain rejections from
//! kassa-core and storage failures from kassa-db both funnel into
//! [`EngineError`]; the distinct variants exist so callers can tell a
//! business refusal (report to the user, nothing written) from an
//! infrastructure failure (retry, alert).

use thiserror::Error;

use kassa_core::{CardError, CoreError, PaymentError};
use kassa_db::DbError;

/// Errors from engine service operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A live job for the same document and operation already exists
    /// within the idempotency window.
    #[error("duplicate job: {existing_job_id} already queued for this document")]
    DuplicateJob { existing_job_id: String },

    /// Another poller claimed the job first, or the job left the
    /// expected status before this operation ran.
    #[error("job {job_id} was already claimed or finished")]
    AlreadyClaimed { job_id: String },

    /// The job does not exist.
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// A sale/return operation was enqueued without its document.
    #[error("operation {operation} requires a sale or return reference")]
    MissingDocumentRef { operation: String },

    /// The referenced document does not exist.
    #[error("document not found: {document_id}")]
    DocumentNotFound { document_id: String },

    /// Core domain rejection (illegal transition, parse failure).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Ledger payment rejection (overpayment, non-positive amount).
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Card state rejection.
    #[error(transparent)]
    Card(#[from] CardError),

    /// Storage failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(err.into())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
