//! # Fiscal Job State Machine
//!
//! Pure transition guards and retry policy for fiscal jobs.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Fiscal Job Lifecycle                                 │
//! │                                                                         │
//! │   enqueue                                                               │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │   PENDING ──pick_up──► PROCESSING ──complete──► COMPLETED (terminal)    │
//! │      ▲                     │                                            │
//! │      │                     │ fail(message)                              │
//! │      │                     ▼                                            │
//! │      └──retry────────── FAILED                                          │
//! │        (is_retriable        │                                           │
//! │         && retry_count<3)   └── otherwise terminal                      │
//! │                                                                         │
//! │   BACKOFF: 30s → 60s → 120s (30 · 2^n), then permanently failed         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why this shape
//! Fiscal devices are slow, unreliable, and sometimes answer with
//! ambiguous duplicate-submission errors. Separating "submitted" from
//! "device confirmed" with an explicit retry ceiling and a non-retriable
//! escape hatch prevents double-fiscalization (a compliance violation)
//! while tolerating transient network failures.
//!
//! The functions here are pure: the database layer enforces the same
//! guards with conditional updates, and the engine calls both.

use chrono::{DateTime, Duration, Utc};

use crate::types::{FiscalJob, JobStatus};

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of failures before a retriable job becomes
/// permanently failed.
pub const MAX_RETRIES: i64 = 3;

/// Base backoff delay in seconds. The n-th retry waits
/// `BACKOFF_BASE_SECS * 2^n` (30s, 60s, 120s).
pub const BACKOFF_BASE_SECS: i64 = 30;

// =============================================================================
// Transition Guards
// =============================================================================

/// Whether a bridge poller may claim this job now.
///
/// Only pending jobs with a due (or absent) `next_retry_at` are
/// claimable. Claiming an already-processing job is refused — that is
/// the state-machine half of the double-execution guard; the conditional
/// UPDATE in the repository is the storage half.
pub fn can_pick_up(job: &FiscalJob, now: DateTime<Utc>) -> bool {
    job.status == JobStatus::Pending && job.next_retry_at.map_or(true, |at| at <= now)
}

/// Whether the job may transition to completed or failed.
///
/// Only a processing job may terminate. A completed job never
/// transitions again: at most one successful completion is ever
/// recorded per sale/return.
pub fn can_finish(job: &FiscalJob) -> bool {
    job.status == JobStatus::Processing
}

/// Whether a failed job has retry budget left.
pub fn can_retry(job: &FiscalJob) -> bool {
    job.status == JobStatus::Failed && job.is_retriable && job.retry_count < MAX_RETRIES
}

/// Backoff delay before the next attempt, given how many failures have
/// already been recorded.
///
/// `retry_count` here is the count *after* the failure was recorded, so
/// the first retry (retry_count=1) waits 30s, the second 60s, the third
/// 120s. The exponent is clamped so a misuse cannot overflow.
pub fn backoff_delay(retry_count: i64) -> Duration {
    let exponent = (retry_count - 1).clamp(0, MAX_RETRIES) as u32;
    Duration::seconds(BACKOFF_BASE_SECS << exponent)
}

/// The earliest instant a failed job may be re-offered to a bridge.
pub fn next_retry_at(now: DateTime<Utc>, retry_count: i64) -> DateTime<Utc> {
    now + backoff_delay(retry_count)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FiscalOperation;

    fn job(status: JobStatus) -> FiscalJob {
        FiscalJob {
            id: "job-1".into(),
            tenant_id: "t-1".into(),
            sale_id: Some("sale-1".into()),
            return_id: None,
            operation: FiscalOperation::Sale,
            status,
            request_data: None,
            response_data: None,
            provider: "omnitech".into(),
            fiscal_number: None,
            fiscal_document_id: None,
            error_message: None,
            retry_count: 0,
            next_retry_at: None,
            is_retriable: true,
            created_at: Utc::now(),
            picked_up_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_pick_up_only_pending() {
        let now = Utc::now();
        assert!(can_pick_up(&job(JobStatus::Pending), now));
        assert!(!can_pick_up(&job(JobStatus::Processing), now));
        assert!(!can_pick_up(&job(JobStatus::Completed), now));
        assert!(!can_pick_up(&job(JobStatus::Failed), now));
    }

    #[test]
    fn test_pick_up_respects_next_retry_at() {
        let now = Utc::now();

        let mut due = job(JobStatus::Pending);
        due.next_retry_at = Some(now - Duration::seconds(1));
        assert!(can_pick_up(&due, now));

        let mut not_due = job(JobStatus::Pending);
        not_due.next_retry_at = Some(now + Duration::seconds(30));
        assert!(!can_pick_up(&not_due, now));
    }

    #[test]
    fn test_finish_only_processing() {
        assert!(can_finish(&job(JobStatus::Processing)));
        assert!(!can_finish(&job(JobStatus::Pending)));
        assert!(!can_finish(&job(JobStatus::Completed)));
        assert!(!can_finish(&job(JobStatus::Failed)));
    }

    #[test]
    fn test_retry_ceiling() {
        let mut failed = job(JobStatus::Failed);

        failed.retry_count = 1;
        assert!(can_retry(&failed));
        failed.retry_count = 2;
        assert!(can_retry(&failed));
        failed.retry_count = MAX_RETRIES;
        assert!(!can_retry(&failed));
    }

    #[test]
    fn test_non_retriable_never_retries() {
        let mut failed = job(JobStatus::Failed);
        failed.retry_count = 1;
        failed.is_retriable = false;
        assert!(!can_retry(&failed));
    }

    #[test]
    fn test_backoff_sequence() {
        // 1st, 2nd, 3rd retry: 30s, 60s, 120s
        assert_eq!(backoff_delay(1), Duration::seconds(30));
        assert_eq!(backoff_delay(2), Duration::seconds(60));
        assert_eq!(backoff_delay(3), Duration::seconds(120));
    }

    #[test]
    fn test_next_retry_at() {
        let now = Utc::now();
        assert_eq!(next_retry_at(now, 1), now + Duration::seconds(30));
        assert_eq!(next_retry_at(now, 2), now + Duration::seconds(60));
    }
}
