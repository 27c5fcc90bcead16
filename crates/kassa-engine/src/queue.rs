//! # Fiscal Job Queue Service
//!
//! Orchestrates the fiscal job lifecycle end to end.
//!
//! ## Lifecycle Orchestration
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FiscalJobQueue                                   │
//! │                                                                         │
//! │  enqueue ──► duplicate probe ──► document check ──► insert(pending)     │
//! │                                                                         │
//! │  pick_up ──► conditional claim (exactly one winner)                     │
//! │                                                                         │
//! │  complete ──► ONE TRANSACTION:                                          │
//! │                 mark job completed (guarded on processing)              │
//! │                 + write fiscal number back onto the sale/return         │
//! │                                                                         │
//! │  fail ──► classify(provider, message)                                   │
//! │             ├─ non-retriable ──► terminal immediately                   │
//! │             ├─ retriable, budget left ──► requeue at now + 30·2ⁿ        │
//! │             └─ retriable, budget spent ──► terminal                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue never talks to a device. An external bridge process polls
//! `due_jobs`, executes the vendor protocol, and reports back through
//! `complete`/`fail`.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use kassa_core::{job, ClassifierRegistry, DocumentRef, FiscalJob, FiscalOperation};
use kassa_db::repository::document::FiscalDocumentRepository;
use kassa_db::repository::job::FiscalJobRepository;
use kassa_db::{Database, NewFiscalJob};

// =============================================================================
// Enqueue Request / Failure Outcome
// =============================================================================

/// What a caller asks the queue to do.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub tenant_id: String,
    pub operation: FiscalOperation,
    pub document: Option<DocumentRef>,
    pub request_data: Option<String>,
    pub provider: String,
}

/// What happened to a job after a reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Retriable with budget left: re-enqueued.
    RetryScheduled { next_retry_at: DateTime<Utc> },
    /// Non-retriable, or retry budget exhausted.
    PermanentlyFailed,
}

/// Suppress duplicate enqueues for the same document within this window.
const DUPLICATE_WINDOW_SECS: i64 = 300;

// =============================================================================
// Queue Service
// =============================================================================

/// Fiscal job orchestration service.
#[derive(Clone)]
pub struct FiscalJobQueue {
    db: Database,
    classifiers: Arc<ClassifierRegistry>,
}

impl FiscalJobQueue {
    /// Creates a queue with the default error-classifier registry.
    pub fn new(db: Database) -> Self {
        FiscalJobQueue {
            db,
            classifiers: Arc::new(ClassifierRegistry::new()),
        }
    }

    /// Creates a queue with vendor-specific classifiers registered.
    pub fn with_classifiers(db: Database, classifiers: ClassifierRegistry) -> Self {
        FiscalJobQueue {
            db,
            classifiers: Arc::new(classifiers),
        }
    }

    /// Enqueues a fiscal job.
    ///
    /// Sale/Return operations must carry exactly one document reference,
    /// the document must exist, and a live job for the same document
    /// within the duplicate window is refused rather than queued twice.
    pub async fn enqueue(&self, request: EnqueueRequest) -> EngineResult<FiscalJob> {
        if request.operation.requires_document_ref() {
            let document = request.document.as_ref().ok_or_else(|| {
                EngineError::MissingDocumentRef {
                    operation: format!("{:?}", request.operation),
                }
            })?;

            self.check_document_exists(document).await?;

            let since = Utc::now() - Duration::seconds(DUPLICATE_WINDOW_SECS);
            if let Some(existing_job_id) = self
                .db
                .jobs()
                .find_recent_duplicate(&request.tenant_id, request.operation, document, since)
                .await?
            {
                warn!(
                    document_id = document.id(),
                    existing_job_id, "Refusing duplicate fiscal job"
                );
                return Err(EngineError::DuplicateJob { existing_job_id });
            }
        }

        let job = self
            .db
            .jobs()
            .insert(NewFiscalJob {
                tenant_id: request.tenant_id,
                operation: request.operation,
                document: request.document,
                request_data: request.request_data,
                provider: request.provider,
            })
            .await?;

        info!(job_id = %job.id, operation = ?job.operation, "Fiscal job enqueued");
        Ok(job)
    }

    /// Pending jobs a bridge may execute now, oldest first.
    pub async fn due_jobs(
        &self,
        tenant_id: &str,
        provider: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> EngineResult<Vec<FiscalJob>> {
        Ok(self.db.jobs().due_pending(tenant_id, provider, now, limit).await?)
    }

    /// Claims a job for processing on behalf of a bridge poller.
    ///
    /// Exactly one of N concurrent claimers wins; the rest get
    /// [`EngineError::AlreadyClaimed`].
    pub async fn pick_up(&self, job_id: &str, now: DateTime<Utc>) -> EngineResult<FiscalJob> {
        let claimed = self.db.jobs().try_pick_up(job_id, now).await?;
        if !claimed {
            // Distinguish "gone" from "lost the race" for the caller
            if self.db.jobs().get_by_id(job_id).await?.is_none() {
                return Err(EngineError::JobNotFound {
                    job_id: job_id.into(),
                });
            }
            debug!(job_id, "Pick-up lost to a concurrent claimer");
            return Err(EngineError::AlreadyClaimed {
                job_id: job_id.into(),
            });
        }

        Ok(self.db.jobs().require(job_id).await?)
    }

    /// Records a successful device confirmation.
    ///
    /// One transaction: the job completes and, for document operations,
    /// the device-issued fiscal number is written back onto the
    /// sale/return. The writeback is guarded, so a document's fiscal
    /// identity is set at most once even if a second completion races
    /// in.
    pub async fn complete(
        &self,
        job_id: &str,
        fiscal_number: Option<&str>,
        fiscal_document_id: Option<&str>,
        response_data: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<FiscalJob> {
        let job = self.require_job(job_id).await?;

        let mut tx = self.db.pool().begin().await?;

        let completed = FiscalJobRepository::mark_completed_tx(
            &mut tx,
            job_id,
            fiscal_number,
            fiscal_document_id,
            response_data,
            now,
        )
        .await?;
        if !completed {
            return Err(EngineError::AlreadyClaimed {
                job_id: job_id.into(),
            });
        }

        if let Some(document) = document_ref(&job) {
            if let Some(number) = fiscal_number {
                let attached = FiscalDocumentRepository::attach_fiscal_number_tx(
                    &mut tx,
                    &document,
                    number,
                    fiscal_document_id,
                )
                .await?;
                if !attached {
                    warn!(
                        job_id,
                        document_id = document.id(),
                        "Document already carries a fiscal number; writeback skipped"
                    );
                }
            }
        }

        tx.commit().await?;

        info!(job_id, fiscal_number, "Fiscal job completed");
        Ok(self.db.jobs().require(job_id).await?)
    }

    /// Records a device/bridge failure and decides what happens next.
    ///
    /// The provider's classifier decides retriability; a retriable
    /// failure with budget left is re-enqueued with exponential backoff
    /// (30s, 60s, 120s), everything else is terminal.
    pub async fn fail(
        &self,
        job_id: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<FailureOutcome> {
        let job = self.require_job(job_id).await?;

        let severity = self.classifiers.classify(&job.provider, error_message);
        let marked = self
            .db
            .jobs()
            .mark_failed(job_id, error_message, severity.is_retriable(), now)
            .await?;
        if !marked {
            return Err(EngineError::AlreadyClaimed {
                job_id: job_id.into(),
            });
        }

        let failed = self.db.jobs().require(job_id).await?;
        if !job::can_retry(&failed) {
            warn!(
                job_id,
                retry_count = failed.retry_count,
                retriable = failed.is_retriable,
                error_message,
                "Fiscal job permanently failed"
            );
            return Ok(FailureOutcome::PermanentlyFailed);
        }

        let next_retry_at = job::next_retry_at(now, failed.retry_count);
        self.db.jobs().requeue_for_retry(job_id, next_retry_at).await?;

        info!(
            job_id,
            retry_count = failed.retry_count,
            %next_retry_at,
            "Fiscal job scheduled for retry"
        );
        Ok(FailureOutcome::RetryScheduled { next_retry_at })
    }

    /// Terminal failures for operator tooling.
    pub async fn failed_jobs(&self, tenant_id: &str) -> EngineResult<Vec<FiscalJob>> {
        Ok(self.db.jobs().list_failed(tenant_id).await?)
    }

    async fn require_job(&self, job_id: &str) -> EngineResult<FiscalJob> {
        self.db
            .jobs()
            .get_by_id(job_id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound {
                job_id: job_id.into(),
            })
    }

    async fn check_document_exists(&self, document: &DocumentRef) -> EngineResult<()> {
        let exists = match document {
            DocumentRef::Sale(id) => self.db.documents().get_sale(id).await?.is_some(),
            DocumentRef::Return(id) => self.db.documents().get_return(id).await?.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(EngineError::DocumentNotFound {
                document_id: document.id().to_string(),
            })
        }
    }
}

fn document_ref(job: &FiscalJob) -> Option<DocumentRef> {
    match (&job.sale_id, &job.return_id) {
        (Some(id), None) => Some(DocumentRef::Sale(id.clone())),
        (None, Some(id)) => Some(DocumentRef::Return(id.clone())),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use kassa_core::JobStatus;
    use kassa_db::DbConfig;

    async fn setup() -> (Database, FiscalJobQueue) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = FiscalJobQueue::new(db.clone());
        (db, queue)
    }

    fn sale_request(sale_id: &str) -> EnqueueRequest {
        EnqueueRequest {
            tenant_id: "t-1".into(),
            operation: FiscalOperation::Sale,
            document: Some(DocumentRef::Sale(sale_id.into())),
            request_data: Some(r#"{"total": 1099}"#.into()),
            provider: "omnitech".into(),
        }
    }

    #[tokio::test]
    async fn test_sale_without_document_refused() {
        let (_db, queue) = setup().await;
        let err = queue
            .enqueue(EnqueueRequest {
                document: None,
                ..sale_request("sale-1")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingDocumentRef { .. }));
    }

    #[tokio::test]
    async fn test_unknown_document_refused() {
        let (_db, queue) = setup().await;
        let err = queue.enqueue(sale_request("no-such-sale")).await.unwrap_err();
        assert!(matches!(err, EngineError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_refused_while_live() {
        let (db, queue) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();

        let first = queue.enqueue(sale_request("sale-1")).await.unwrap();
        let err = queue.enqueue(sale_request("sale-1")).await.unwrap_err();
        match err {
            EngineError::DuplicateJob { existing_job_id } => {
                assert_eq!(existing_job_id, first.id)
            }
            other => panic!("expected DuplicateJob, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pick_up_single_winner() {
        let (db, queue) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();
        let job = queue.enqueue(sale_request("sale-1")).await.unwrap();

        let now = Utc::now();
        let claimed = queue.pick_up(&job.id, now).await.unwrap();
        assert_eq!(claimed.status, JobStatus::Processing);

        let err = queue.pick_up(&job.id, now).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyClaimed { .. }));
    }

    #[tokio::test]
    async fn test_complete_writes_fiscal_number_back() {
        let (db, queue) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();
        let job = queue.enqueue(sale_request("sale-1")).await.unwrap();

        let now = Utc::now();
        queue.pick_up(&job.id, now).await.unwrap();
        let completed = queue
            .complete(&job.id, Some("FN-001"), Some("HASH-001"), None, now)
            .await
            .unwrap();

        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.fiscal_number.as_deref(), Some("FN-001"));

        let sale = db.documents().get_sale("sale-1").await.unwrap().unwrap();
        assert_eq!(sale.fiscal_number.as_deref(), Some("FN-001"));
        assert_eq!(sale.fiscal_document_id.as_deref(), Some("HASH-001"));
    }

    #[tokio::test]
    async fn test_complete_requires_processing() {
        let (db, queue) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();
        let job = queue.enqueue(sale_request("sale-1")).await.unwrap();

        // Never picked up: completion refused
        let err = queue
            .complete(&job.id, Some("FN-001"), None, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyClaimed { .. }));
    }

    #[tokio::test]
    async fn test_completed_job_cannot_complete_again() {
        let (db, queue) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();
        let job = queue.enqueue(sale_request("sale-1")).await.unwrap();

        let now = Utc::now();
        queue.pick_up(&job.id, now).await.unwrap();
        queue
            .complete(&job.id, Some("FN-001"), None, None, now)
            .await
            .unwrap();

        let err = queue
            .complete(&job.id, Some("FN-002"), None, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyClaimed { .. }));

        // First writeback stands
        let sale = db.documents().get_sale("sale-1").await.unwrap().unwrap();
        assert_eq!(sale.fiscal_number.as_deref(), Some("FN-001"));
    }

    #[tokio::test]
    async fn test_retry_backoff_sequence_then_permanent() {
        let (db, queue) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();
        let job = queue.enqueue(sale_request("sale-1")).await.unwrap();

        let mut now = Utc::now();

        // First and second failure: backoff doubles
        for delay in [30, 60] {
            queue.pick_up(&job.id, now).await.unwrap();
            let outcome = queue.fail(&job.id, "network timeout", now).await.unwrap();
            assert_eq!(
                outcome,
                FailureOutcome::RetryScheduled {
                    next_retry_at: now + Duration::seconds(delay)
                }
            );
            now += Duration::seconds(delay);
        }

        // Third failure reaches the retry ceiling
        queue.pick_up(&job.id, now).await.unwrap();
        let outcome = queue.fail(&job.id, "network timeout", now).await.unwrap();
        assert_eq!(outcome, FailureOutcome::PermanentlyFailed);

        let stored = db.jobs().require(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.retry_count, 3);
        assert!(stored.is_retriable); // budget, not classification, ended it
    }

    #[tokio::test]
    async fn test_duplicate_rejection_is_terminal_immediately() {
        let (db, queue) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();
        let job = queue.enqueue(sale_request("sale-1")).await.unwrap();

        let now = Utc::now();
        queue.pick_up(&job.id, now).await.unwrap();
        let outcome = queue
            .fail(&job.id, "Təkrar satış: already exists", now)
            .await
            .unwrap();

        // Full retry budget left, yet terminal: retrying a duplicate
        // rejection would fiscalize the sale twice
        assert_eq!(outcome, FailureOutcome::PermanentlyFailed);

        let stored = db.jobs().require(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(!stored.is_retriable);
        assert_eq!(stored.retry_count, 1);

        let failed = queue.failed_jobs("t-1").await.unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn test_shift_operation_needs_no_document() {
        let (db, queue) = setup().await;
        let job = queue
            .enqueue(EnqueueRequest {
                tenant_id: "t-1".into(),
                operation: FiscalOperation::ShiftOpen,
                document: None,
                request_data: None,
                provider: "omnitech".into(),
            })
            .await
            .unwrap();

        let now = Utc::now();
        queue.pick_up(&job.id, now).await.unwrap();
        let completed = queue.complete(&job.id, None, None, None, now).await.unwrap();
        assert_eq!(completed.status, JobStatus::Completed);

        assert!(db.jobs().due_pending("t-1", "omnitech", now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_due_jobs_ordering_and_window() {
        let (db, queue) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();
        db.documents().insert_sale("sale-2", "t-1").await.unwrap();

        let a = queue.enqueue(sale_request("sale-1")).await.unwrap();
        let b = queue.enqueue(sale_request("sale-2")).await.unwrap();

        let due = queue
            .due_jobs("t-1", "omnitech", Utc::now(), 10)
            .await
            .unwrap();
        let ids: Vec<_> = due.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);
    }
}
