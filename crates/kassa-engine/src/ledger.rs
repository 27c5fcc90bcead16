//! # Ledger Engine
//!
//! Atomic credit-ledger operations: entry creation with reference-number
//! allocation, payments, reversals, and goods-receipt propagation.
//!
//! ## One Transaction Per Mutation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_payment(entry, 400)                                             │
//! │                                                                         │
//! │   BEGIN                                                                 │
//! │     load entry                                                          │
//! │     kassa_core::ledger::apply_payment   (pure: rejects overpayment)     │
//! │     UPDATE credit_entries   remaining 1000 → 600, status → partial      │
//! │     INSERT credit_payments  +400 (audit delta)                          │
//! │     UPDATE goods_receipts   payment_status → partial   (if linked)      │
//! │   COMMIT                                                                │
//! │                                                                         │
//! │  A rejected payment exits before the first write: nothing to roll back. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `amount` on an entry is immutable here: no method of this service
//! writes it after creation.

use chrono::{Datelike, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::EngineResult;
use kassa_core::refnum::{self, Scope, DEFAULT_SEQ_WIDTH};
use kassa_core::{ledger, validation, CoreError};
use kassa_core::types::{
    CounterpartyKind, CreditEntry, CreditPayment, ReceiptPaymentStatus,
};
use kassa_core::Money;
use kassa_db::repository::credit::CreditEntryRepository;
use kassa_db::repository::receipt::GoodsReceiptRepository;
use kassa_db::repository::sequence::SequenceRepository;
use kassa_db::{Database, NewCreditEntry};

/// Reference prefixes per counterparty side.
fn reference_prefix(kind: CounterpartyKind) -> &'static str {
    match kind {
        CounterpartyKind::Supplier => "SC",
        CounterpartyKind::Customer => "CC",
    }
}

// =============================================================================
// Ledger Engine
// =============================================================================

/// Credit-ledger orchestration service.
#[derive(Clone)]
pub struct LedgerEngine {
    db: Database,
}

impl LedgerEngine {
    /// Creates a new LedgerEngine.
    pub fn new(db: Database) -> Self {
        LedgerEngine { db }
    }

    /// Opens a credit entry.
    ///
    /// The reference number is allocated and the entry inserted in one
    /// transaction: a rolled-back insert may leave a gap in the
    /// sequence, never a duplicate. `remaining` starts equal to
    /// `amount` and `status` at pending.
    pub async fn create_credit(&self, new: NewCreditEntry) -> EngineResult<CreditEntry> {
        validation::require_positive("amount", new.amount).map_err(CoreError::from)?;
        validation::require_non_empty("tenant_id", &new.tenant_id).map_err(CoreError::from)?;
        validation::require_non_empty("counterparty_id", &new.counterparty_id)
            .map_err(CoreError::from)?;

        let now = Utc::now();
        let scope = Scope::Year(new.credit_date.year());
        let prefix = reference_prefix(new.counterparty_kind);

        let mut tx = self.db.pool().begin().await?;

        let seq =
            SequenceRepository::next_tx(&mut tx, &new.tenant_id, prefix, &scope.key()).await?;
        let reference_number = refnum::format_reference(prefix, scope, seq, DEFAULT_SEQ_WIDTH);

        let entry = CreditEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: new.tenant_id,
            counterparty_kind: new.counterparty_kind,
            counterparty_id: new.counterparty_id,
            branch_id: new.branch_id,
            kind: new.kind,
            amount: new.amount,
            remaining: new.amount,
            status: ledger::status_for(new.amount, new.amount),
            credit_date: new.credit_date,
            due_date: new.due_date,
            reference_number,
            goods_receipt_id: new.goods_receipt_id,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        CreditEntryRepository::insert_tx(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(
            entry_id = %entry.id,
            reference = %entry.reference_number,
            amount = %entry.amount,
            "Credit entry created"
        );
        Ok(entry)
    }

    /// Applies a payment against an entry's remaining balance.
    ///
    /// Overpayment and non-positive amounts are rejected before any
    /// write. On success the balance, the audit history, and the linked
    /// receipt's payment status all commit together.
    pub async fn record_payment(
        &self,
        entry_id: &str,
        amount: Money,
        paid_on: NaiveDate,
        description: Option<String>,
    ) -> EngineResult<CreditEntry> {
        let mut tx = self.db.pool().begin().await?;
        let entry =
            Self::apply_payment_tx(&mut tx, entry_id, amount, paid_on, description).await?;
        tx.commit().await?;

        info!(
            entry_id,
            amount = %amount,
            remaining = %entry.remaining,
            status = ?entry.status,
            "Payment recorded"
        );
        Ok(entry)
    }

    /// Reverses a previously applied payment.
    ///
    /// Restores the balance (capped at the original amount), appends a
    /// negative audit delta, and re-propagates the linked receipt — all
    /// in one transaction. Used by the expense-deletion cascade.
    pub async fn reverse_recorded_payment(
        &self,
        entry_id: &str,
        amount: Money,
        description: Option<String>,
    ) -> EngineResult<CreditEntry> {
        let mut tx = self.db.pool().begin().await?;
        let entry = Self::reverse_payment_tx(&mut tx, entry_id, amount, description).await?;
        tx.commit().await?;

        info!(
            entry_id,
            amount = %amount,
            remaining = %entry.remaining,
            "Payment reversed"
        );
        Ok(entry)
    }

    /// The ordered audit history of an entry.
    pub async fn payment_history(&self, entry_id: &str) -> EngineResult<Vec<CreditPayment>> {
        Ok(self.db.credits().payment_history(entry_id).await?)
    }

    /// Verifies that replaying the audit history reproduces the stored
    /// balance. Divergence means a balance write and a history append
    /// were not atomic.
    pub async fn audit(&self, entry_id: &str) -> EngineResult<bool> {
        let entry = self.db.credits().require(entry_id).await?;
        let deltas: Vec<Money> = self
            .payment_history(entry_id)
            .await?
            .into_iter()
            .map(|p| p.amount)
            .collect();

        Ok(ledger::replay_remaining(entry.amount, &deltas) == entry.remaining)
    }

    // =========================================================================
    // Transaction-Scoped Halves
    // =========================================================================

    /// Payment inside an already-open transaction.
    pub(crate) async fn apply_payment_tx(
        tx: &mut sqlx::SqliteConnection,
        entry_id: &str,
        amount: Money,
        paid_on: NaiveDate,
        description: Option<String>,
    ) -> EngineResult<CreditEntry> {
        let mut entry = CreditEntryRepository::get_by_id_tx(tx, entry_id)
            .await?
            .ok_or_else(|| kassa_db::DbError::not_found("CreditEntry", entry_id))?;

        let delta = ledger::apply_payment(&mut entry, amount)?;
        Self::persist_mutation_tx(tx, &entry, delta, paid_on, description).await?;
        Ok(entry)
    }

    /// Reversal inside an already-open transaction.
    pub(crate) async fn reverse_payment_tx(
        tx: &mut sqlx::SqliteConnection,
        entry_id: &str,
        amount: Money,
        description: Option<String>,
    ) -> EngineResult<CreditEntry> {
        let mut entry = CreditEntryRepository::get_by_id_tx(tx, entry_id)
            .await?
            .ok_or_else(|| kassa_db::DbError::not_found("CreditEntry", entry_id))?;

        let delta = ledger::reverse_payment(&mut entry, amount);
        Self::persist_mutation_tx(tx, &entry, delta, Utc::now().date_naive(), description)
            .await?;
        Ok(entry)
    }

    /// Writes the three halves of a balance mutation: the entry, the
    /// audit delta, and the linked receipt's derived status.
    async fn persist_mutation_tx(
        tx: &mut sqlx::SqliteConnection,
        entry: &CreditEntry,
        delta: Money,
        paid_on: NaiveDate,
        description: Option<String>,
    ) -> EngineResult<()> {
        let now = Utc::now();

        CreditEntryRepository::update_balance_tx(tx, &entry.id, entry.remaining, entry.status, now)
            .await?;

        CreditEntryRepository::append_payment_tx(
            tx,
            &CreditPayment {
                id: Uuid::new_v4().to_string(),
                entry_id: entry.id.clone(),
                amount: delta,
                paid_on,
                description,
                created_at: now,
            },
        )
        .await?;

        if let Some(receipt_id) = &entry.goods_receipt_id {
            let status = ReceiptPaymentStatus::derive(entry.remaining, entry.amount);
            debug!(receipt_id, ?status, "Propagating to linked goods receipt");
            GoodsReceiptRepository::set_payment_status_tx(tx, receipt_id, status).await?;
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
