//! # kassa-engine: Orchestration Services for the Fiscal Back-Office Core
//!
//! Composes the pure logic in kassa-core with the repositories in
//! kassa-db into atomic business operations.
//!
//! ## Service Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           kassa-engine                                  │
//! │                                                                         │
//! │   Engine (facade)                                                       │
//! │     ├── queue      FiscalJobQueue    enqueue / pick_up / complete/fail  │
//! │     ├── ledger     LedgerEngine      credits, payments, reversals       │
//! │     ├── expenses   ExpenseService    record + deletion cascade          │
//! │     ├── shift      ShiftSynchronizer device-authoritative mirror        │
//! │     ├── cards      CardService       gift/loyalty lifecycle             │
//! │     └── refs       ReferenceNumbers  atomic numbering                   │
//! │                                                                         │
//! │   Engine::complete_job additionally routes shift-operation              │
//! │   completions into the synchronizer, so a finished shift_open /         │
//! │   shift_close / shift_status updates the tenant mirror.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every multi-write operation runs in one SQLite transaction; a
//! failure in any step rolls the whole operation back.

pub mod cards;
pub mod cascade;
pub mod error;
pub mod ledger;
pub mod queue;
pub mod refnum;
pub mod shift;

pub use cards::CardService;
pub use cascade::{ExpenseRequest, ExpenseService};
pub use error::{EngineError, EngineResult};
pub use ledger::LedgerEngine;
pub use queue::{EnqueueRequest, FailureOutcome, FiscalJobQueue};
pub use refnum::ReferenceNumbers;
pub use shift::ShiftSynchronizer;

use chrono::{DateTime, Utc};
use kassa_core::{FiscalJob, FiscalOperation};
use kassa_db::Database;

// =============================================================================
// Engine Facade
// =============================================================================

/// One handle over all services, sharing a database pool.
#[derive(Clone)]
pub struct Engine {
    queue: FiscalJobQueue,
    ledger: LedgerEngine,
    expenses: ExpenseService,
    shift: ShiftSynchronizer,
    cards: CardService,
    refs: ReferenceNumbers,
}

impl Engine {
    /// Builds the full service set over one database handle.
    pub fn new(db: Database) -> Self {
        Engine {
            queue: FiscalJobQueue::new(db.clone()),
            ledger: LedgerEngine::new(db.clone()),
            expenses: ExpenseService::new(db.clone()),
            shift: ShiftSynchronizer::new(db.clone()),
            cards: CardService::new(db.clone()),
            refs: ReferenceNumbers::new(db),
        }
    }

    pub fn queue(&self) -> &FiscalJobQueue {
        &self.queue
    }

    pub fn ledger(&self) -> &LedgerEngine {
        &self.ledger
    }

    pub fn expenses(&self) -> &ExpenseService {
        &self.expenses
    }

    pub fn shift(&self) -> &ShiftSynchronizer {
        &self.shift
    }

    pub fn cards(&self) -> &CardService {
        &self.cards
    }

    pub fn refs(&self) -> &ReferenceNumbers {
        &self.refs
    }

    /// Completes a job and applies its side effects.
    ///
    /// Beyond the queue's own completion (status + fiscal-number
    /// writeback), shift operations update the tenant's shift mirror:
    /// shift_open opens it, shift_close records the Z-report, and
    /// shift_status reconciles from the device's response payload.
    pub async fn complete_job(
        &self,
        job_id: &str,
        fiscal_number: Option<&str>,
        fiscal_document_id: Option<&str>,
        response_data: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<FiscalJob> {
        let job = self
            .queue
            .complete(job_id, fiscal_number, fiscal_document_id, response_data, now)
            .await?;

        match job.operation {
            FiscalOperation::ShiftOpen => {
                self.shift
                    .apply_shift_open(&job.tenant_id, &job.provider, now)
                    .await?;
            }
            FiscalOperation::ShiftClose => {
                self.shift
                    .apply_shift_close(&job.tenant_id, &job.provider, now)
                    .await?;
            }
            FiscalOperation::ShiftStatus => {
                if let Some(payload) = response_data {
                    self.shift
                        .reconcile(&job.tenant_id, &job.provider, payload, now)
                        .await?;
                }
            }
            _ => {}
        }

        Ok(job)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use kassa_db::DbConfig;

    async fn setup() -> (Database, Engine) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let engine = Engine::new(db.clone());
        (db, engine)
    }

    async fn run_shift_job(
        engine: &Engine,
        operation: FiscalOperation,
        response: Option<&str>,
        now: DateTime<Utc>,
    ) -> FiscalJob {
        let job = engine
            .queue()
            .enqueue(EnqueueRequest {
                tenant_id: "t-1".into(),
                operation,
                document: None,
                request_data: None,
                provider: "omnitech".into(),
            })
            .await
            .unwrap();
        engine.queue().pick_up(&job.id, now).await.unwrap();
        engine
            .complete_job(&job.id, None, None, response, now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_shift_open_job_updates_mirror() {
        let (_db, engine) = setup().await;
        let now = Utc::now();

        run_shift_job(&engine, FiscalOperation::ShiftOpen, None, now).await;

        let config = engine.shift().current("t-1", "omnitech").await.unwrap();
        assert!(config.shift_open);
        assert_eq!(config.shift_opened_at, Some(now));
    }

    #[tokio::test]
    async fn test_shift_close_job_records_z_report() {
        let (_db, engine) = setup().await;
        let now = Utc::now();

        run_shift_job(&engine, FiscalOperation::ShiftOpen, None, now).await;
        run_shift_job(&engine, FiscalOperation::ShiftClose, None, now).await;

        let config = engine.shift().current("t-1", "omnitech").await.unwrap();
        assert!(!config.shift_open);
        assert_eq!(config.last_z_report_at, Some(now));
    }

    #[tokio::test]
    async fn test_shift_status_job_reconciles_from_device() {
        let (_db, engine) = setup().await;
        let now = Utc::now();

        // Mirror believes the shift is open; the device disagrees
        run_shift_job(&engine, FiscalOperation::ShiftOpen, None, now).await;
        run_shift_job(
            &engine,
            FiscalOperation::ShiftStatus,
            Some(r#"{"shift_open": false}"#),
            now,
        )
        .await;

        let config = engine.shift().current("t-1", "omnitech").await.unwrap();
        assert!(!config.shift_open);
    }

    #[tokio::test]
    async fn test_sale_completion_leaves_shift_alone() {
        let (db, engine) = setup().await;
        db.documents().insert_sale("sale-1", "t-1").await.unwrap();
        let now = Utc::now();

        let job = engine
            .queue()
            .enqueue(EnqueueRequest {
                tenant_id: "t-1".into(),
                operation: FiscalOperation::Sale,
                document: Some(kassa_core::DocumentRef::Sale("sale-1".into())),
                request_data: None,
                provider: "omnitech".into(),
            })
            .await
            .unwrap();
        engine.queue().pick_up(&job.id, now).await.unwrap();
        engine
            .complete_job(&job.id, Some("FN-1"), None, None, now)
            .await
            .unwrap();

        let config = engine.shift().current("t-1", "omnitech").await.unwrap();
        assert!(!config.shift_open);
    }
}
