//! # Fiscal Job Repository
//!
//! Durable queue of fiscal-device requests.
//!
//! ## Queue Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       fiscal_jobs Table                                 │
//! │                                                                         │
//! │  POS event ──► insert(pending)                                          │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │  Bridge poller ──► due_pending() ──► try_pick_up()                      │
//! │                                          │                              │
//! │              UPDATE ... WHERE status='pending'  ◄── the exclusivity     │
//! │              rows_affected == 0 → someone else won, poller moves on     │
//! │                                          │                              │
//! │                                          ▼                              │
//! │  Device result ──► mark_completed_tx() / mark_failed()                  │
//! │                                          │                              │
//! │  Failed + retriable ──► requeue_for_retry(next_retry_at)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every state change is a conditional UPDATE guarded on the current
//! status; the caller learns from `rows_affected` whether it won. This
//! is the storage half of the state machine — the pure half lives in
//! `kassa_core::job`.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kassa_core::{DocumentRef, FiscalJob, FiscalOperation, JobStatus};

/// Columns selected for every FiscalJob read, in struct order.
const JOB_COLUMNS: &str = "id, tenant_id, sale_id, return_id, operation, status, \
     request_data, response_data, provider, fiscal_number, fiscal_document_id, \
     error_message, retry_count, next_retry_at, is_retriable, \
     created_at, picked_up_at, completed_at";

// =============================================================================
// New Job Input
// =============================================================================

/// Input for enqueueing a fiscal job.
#[derive(Debug, Clone)]
pub struct NewFiscalJob {
    /// Owning tenant.
    pub tenant_id: String,

    /// What the device should do.
    pub operation: FiscalOperation,

    /// The sale or return being fiscalized, for document operations.
    pub document: Option<DocumentRef>,

    /// Opaque vendor request payload (JSON text).
    pub request_data: Option<String>,

    /// Fiscal vendor identifier.
    pub provider: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for fiscal job queue operations.
#[derive(Debug, Clone)]
pub struct FiscalJobRepository {
    pool: SqlitePool,
}

impl FiscalJobRepository {
    /// Creates a new FiscalJobRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FiscalJobRepository { pool }
    }

    /// Gets a job by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<FiscalJob>> {
        let job = sqlx::query_as::<_, FiscalJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM fiscal_jobs WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Inserts a new pending job and returns it.
    pub async fn insert(&self, new: NewFiscalJob) -> DbResult<FiscalJob> {
        let now = Utc::now();
        let (sale_id, return_id) = match &new.document {
            Some(DocumentRef::Sale(id)) => (Some(id.clone()), None),
            Some(DocumentRef::Return(id)) => (None, Some(id.clone())),
            None => (None, None),
        };

        let job = FiscalJob {
            id: Uuid::new_v4().to_string(),
            tenant_id: new.tenant_id,
            sale_id,
            return_id,
            operation: new.operation,
            status: JobStatus::Pending,
            request_data: new.request_data,
            response_data: None,
            provider: new.provider,
            fiscal_number: None,
            fiscal_document_id: None,
            error_message: None,
            retry_count: 0,
            next_retry_at: None,
            is_retriable: true,
            created_at: now,
            picked_up_at: None,
            completed_at: None,
        };

        debug!(id = %job.id, operation = ?job.operation, "Enqueueing fiscal job");

        sqlx::query(
            r#"
            INSERT INTO fiscal_jobs (
                id, tenant_id, sale_id, return_id, operation, status,
                request_data, response_data, provider, fiscal_number,
                fiscal_document_id, error_message, retry_count,
                next_retry_at, is_retriable, created_at, picked_up_at,
                completed_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13,
                ?14, ?15, ?16, ?17,
                ?18
            )
            "#,
        )
        .bind(&job.id)
        .bind(&job.tenant_id)
        .bind(&job.sale_id)
        .bind(&job.return_id)
        .bind(job.operation)
        .bind(job.status)
        .bind(&job.request_data)
        .bind(&job.response_data)
        .bind(&job.provider)
        .bind(&job.fiscal_number)
        .bind(&job.fiscal_document_id)
        .bind(&job.error_message)
        .bind(job.retry_count)
        .bind(job.next_retry_at)
        .bind(job.is_retriable)
        .bind(job.created_at)
        .bind(job.picked_up_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(job)
    }

    /// Pending jobs a bridge may execute now, oldest first.
    ///
    /// Jobs whose `next_retry_at` lies in the future are withheld —
    /// retry scheduling is passive, the hint is honored at read time.
    pub async fn due_pending(
        &self,
        tenant_id: &str,
        provider: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<FiscalJob>> {
        let jobs = sqlx::query_as::<_, FiscalJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM fiscal_jobs
            WHERE tenant_id = ?1 AND provider = ?2 AND status = 'pending'
              AND (next_retry_at IS NULL OR next_retry_at <= ?3)
            ORDER BY created_at ASC
            LIMIT ?4
            "#
        ))
        .bind(tenant_id)
        .bind(provider)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Attempts to claim a pending job for processing.
    ///
    /// Returns `false` when another poller already claimed it (or it is
    /// not due). The conditional UPDATE makes the claim exclusive:
    /// two concurrent bridges can never both move the same job to
    /// processing.
    pub async fn try_pick_up(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fiscal_jobs SET
                status = 'processing',
                picked_up_at = ?2
            WHERE id = ?1 AND status = 'pending'
              AND (next_retry_at IS NULL OR next_retry_at <= ?2)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks a processing job completed, storing the device's numbers.
    ///
    /// Guarded on status='processing': a completed job can never be
    /// completed twice, which is what keeps one successful completion
    /// per sale/return.
    pub async fn mark_completed_tx(
        conn: &mut SqliteConnection,
        id: &str,
        fiscal_number: Option<&str>,
        fiscal_document_id: Option<&str>,
        response_data: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fiscal_jobs SET
                status = 'completed',
                fiscal_number = ?2,
                fiscal_document_id = ?3,
                response_data = ?4,
                completed_at = ?5
            WHERE id = ?1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(fiscal_number)
        .bind(fiscal_document_id)
        .bind(response_data)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a failure: increments retry_count, stores the message
    /// and the classification.
    pub async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        is_retriable: bool,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fiscal_jobs SET
                status = 'failed',
                error_message = ?2,
                is_retriable = ?3,
                retry_count = retry_count + 1,
                completed_at = ?4
            WHERE id = ?1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(is_retriable)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Re-enqueues a failed job with a future `next_retry_at`.
    ///
    /// Clears the processing/failure bookkeeping so the next attempt
    /// starts clean. The retry budget check belongs to the engine.
    pub async fn requeue_for_retry(
        &self,
        id: &str,
        next_retry_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fiscal_jobs SET
                status = 'pending',
                picked_up_at = NULL,
                completed_at = NULL,
                error_message = NULL,
                next_retry_at = ?2
            WHERE id = ?1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .bind(next_retry_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Terminal failures for operator tooling (alerting, manual
    /// intervention), newest first.
    pub async fn list_failed(&self, tenant_id: &str) -> DbResult<Vec<FiscalJob>> {
        let jobs = sqlx::query_as::<_, FiscalJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM fiscal_jobs
            WHERE tenant_id = ?1 AND status = 'failed'
            ORDER BY completed_at DESC
            "#
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Looks for a live (pending/processing) job for the same document
    /// and operation created within the idempotency window.
    pub async fn find_recent_duplicate(
        &self,
        tenant_id: &str,
        operation: FiscalOperation,
        document: &DocumentRef,
        since: DateTime<Utc>,
    ) -> DbResult<Option<String>> {
        let (sale_id, return_id) = match document {
            DocumentRef::Sale(id) => (Some(id.as_str()), None),
            DocumentRef::Return(id) => (None, Some(id.as_str())),
        };

        let existing: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM fiscal_jobs
            WHERE tenant_id = ?1 AND operation = ?2
              AND (sale_id = ?3 OR return_id = ?4)
              AND status IN ('pending', 'processing')
              AND created_at >= ?5
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(operation)
        .bind(sale_id)
        .bind(return_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;

        Ok(existing.map(|(id,)| id))
    }

    /// Fetches a job or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<FiscalJob> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("FiscalJob", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
