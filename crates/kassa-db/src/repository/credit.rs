//! # Credit Entry Repository
//!
//! Storage for the credit ledger: entries with a running balance and
//! their append-only payment history.
//!
//! ## Mutation Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engine transaction (one per ledger mutation)                           │
//! │                                                                         │
//! │   get_by_id_tx ──► kassa_core::ledger::apply_payment (pure)             │
//! │        │                        │                                       │
//! │        │                        ▼                                       │
//! │        │            update_balance_tx (remaining + status + updated_at) │
//! │        │                        │                                       │
//! │        │                        ▼                                       │
//! │        │            append_payment_tx (signed audit delta)              │
//! │        │                        │                                       │
//! │        └── same conn ───────────┴──► receipt propagation, then COMMIT   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The balance update and the history append must land in the same
//! transaction; the repository exposes them as `_tx` halves and never
//! writes `remaining` on its own initiative.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kassa_core::types::{
    CounterpartyKind, CreditEntry, CreditPayment, CreditStatus, EntryKind,
};
use kassa_core::Money;

const ENTRY_COLUMNS: &str = "id, tenant_id, counterparty_kind, counterparty_id, branch_id, \
     kind, amount, remaining, status, credit_date, due_date, reference_number, \
     goods_receipt_id, description, created_at, updated_at";

// =============================================================================
// New Entry Input
// =============================================================================

/// Input for opening a credit entry. Reference number allocation and
/// the remaining/status seed happen in the engine.
#[derive(Debug, Clone)]
pub struct NewCreditEntry {
    pub tenant_id: String,
    pub counterparty_kind: CounterpartyKind,
    pub counterparty_id: String,
    pub branch_id: Option<String>,
    pub kind: EntryKind,
    pub amount: Money,
    pub credit_date: chrono::NaiveDate,
    pub due_date: Option<chrono::NaiveDate>,
    pub goods_receipt_id: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for credit ledger storage.
#[derive(Debug, Clone)]
pub struct CreditEntryRepository {
    pool: SqlitePool,
}

impl CreditEntryRepository {
    /// Creates a new CreditEntryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CreditEntryRepository { pool }
    }

    /// Gets a credit entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CreditEntry>> {
        let entry = sqlx::query_as::<_, CreditEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM credit_entries WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Fetches a credit entry or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<CreditEntry> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("CreditEntry", id))
    }

    /// Gets a credit entry inside an open transaction.
    pub async fn get_by_id_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<CreditEntry>> {
        let entry = sqlx::query_as::<_, CreditEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM credit_entries WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(entry)
    }

    /// The supplier credit linked to a goods receipt, if any.
    pub async fn find_by_receipt_tx(
        conn: &mut SqliteConnection,
        goods_receipt_id: &str,
    ) -> DbResult<Option<CreditEntry>> {
        let entry = sqlx::query_as::<_, CreditEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM credit_entries WHERE goods_receipt_id = ?1"
        ))
        .bind(goods_receipt_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(entry)
    }

    /// Entries for one counterparty, newest first.
    pub async fn list_for_counterparty(
        &self,
        tenant_id: &str,
        counterparty_kind: CounterpartyKind,
        counterparty_id: &str,
    ) -> DbResult<Vec<CreditEntry>> {
        let entries = sqlx::query_as::<_, CreditEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM credit_entries
            WHERE tenant_id = ?1 AND counterparty_kind = ?2 AND counterparty_id = ?3
            ORDER BY created_at DESC
            "#
        ))
        .bind(tenant_id)
        .bind(counterparty_kind)
        .bind(counterparty_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Inserts a fully-constructed credit entry.
    ///
    /// Runs inside the engine's creation transaction so the entry and
    /// its reference-number allocation commit together.
    pub async fn insert_tx(conn: &mut SqliteConnection, entry: &CreditEntry) -> DbResult<()> {
        debug!(
            id = %entry.id,
            reference = %entry.reference_number,
            amount = %entry.amount,
            "Inserting credit entry"
        );

        sqlx::query(
            r#"
            INSERT INTO credit_entries (
                id, tenant_id, counterparty_kind, counterparty_id, branch_id,
                kind, amount, remaining, status, credit_date, due_date,
                reference_number, goods_receipt_id, description,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16
            )
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(entry.counterparty_kind)
        .bind(&entry.counterparty_id)
        .bind(&entry.branch_id)
        .bind(entry.kind)
        .bind(entry.amount)
        .bind(entry.remaining)
        .bind(entry.status)
        .bind(entry.credit_date)
        .bind(entry.due_date)
        .bind(&entry.reference_number)
        .bind(&entry.goods_receipt_id)
        .bind(&entry.description)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes a new balance and status. The caller supplies values
    /// produced by the pure ledger functions — this method is storage,
    /// not arithmetic.
    pub async fn update_balance_tx(
        conn: &mut SqliteConnection,
        id: &str,
        remaining: Money,
        status: CreditStatus,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE credit_entries SET remaining = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(remaining)
        .bind(status)
        .bind(updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Appends one signed audit delta to the payment history.
    pub async fn append_payment_tx(
        conn: &mut SqliteConnection,
        payment: &CreditPayment,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credit_payments (id, entry_id, amount, paid_on, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.entry_id)
        .bind(payment.amount)
        .bind(payment.paid_on)
        .bind(&payment.description)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Ordered payment history of an entry (the audit trail).
    pub async fn payment_history(&self, entry_id: &str) -> DbResult<Vec<CreditPayment>> {
        let payments = sqlx::query_as::<_, CreditPayment>(
            r#"
            SELECT id, entry_id, amount, paid_on, description, created_at
            FROM credit_payments
            WHERE entry_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn entry(tenant: &str, amount: i64) -> CreditEntry {
        let now = Utc::now();
        CreditEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.into(),
            counterparty_kind: CounterpartyKind::Supplier,
            counterparty_id: "sup-1".into(),
            branch_id: None,
            kind: EntryKind::Credit,
            amount: Money::from_qepik(amount),
            remaining: Money::from_qepik(amount),
            status: CreditStatus::Pending,
            credit_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            due_date: None,
            reference_number: format!("SC-2026-{:06}", amount),
            goods_receipt_id: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.credits();
        let e = entry("t-1", 100_000);

        let mut tx = db.pool().begin().await.unwrap();
        CreditEntryRepository::insert_tx(&mut tx, &e).await.unwrap();
        tx.commit().await.unwrap();

        let fetched = repo.require(&e.id).await.unwrap();
        assert_eq!(fetched.amount, Money::from_qepik(100_000));
        assert_eq!(fetched.remaining, fetched.amount);
        assert_eq!(fetched.status, CreditStatus::Pending);
    }

    #[tokio::test]
    async fn test_balance_and_history_commit_together() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.credits();
        let e = entry("t-1", 100_000);

        let mut tx = db.pool().begin().await.unwrap();
        CreditEntryRepository::insert_tx(&mut tx, &e).await.unwrap();
        tx.commit().await.unwrap();

        let now = Utc::now();
        let payment = CreditPayment {
            id: Uuid::new_v4().to_string(),
            entry_id: e.id.clone(),
            amount: Money::from_qepik(40_000),
            paid_on: NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
            description: None,
            created_at: now,
        };

        let mut tx = db.pool().begin().await.unwrap();
        CreditEntryRepository::update_balance_tx(
            &mut tx,
            &e.id,
            Money::from_qepik(60_000),
            CreditStatus::Partial,
            now,
        )
        .await
        .unwrap();
        CreditEntryRepository::append_payment_tx(&mut tx, &payment)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let fetched = repo.require(&e.id).await.unwrap();
        assert_eq!(fetched.remaining, Money::from_qepik(60_000));
        assert_eq!(fetched.status, CreditStatus::Partial);

        let history = repo.payment_history(&e.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, Money::from_qepik(40_000));
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_negative_remaining() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let e = entry("t-1", 50_000);

        let mut tx = db.pool().begin().await.unwrap();
        CreditEntryRepository::insert_tx(&mut tx, &e).await.unwrap();

        let err = CreditEntryRepository::update_balance_tx(
            &mut tx,
            &e.id,
            Money::from_qepik(-1),
            CreditStatus::Paid,
            Utc::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_reference_number_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = entry("t-1", 10_000);
        let mut b = entry("t-1", 20_000);
        b.reference_number = a.reference_number.clone();

        let mut tx = db.pool().begin().await.unwrap();
        CreditEntryRepository::insert_tx(&mut tx, &a).await.unwrap();
        let err = CreditEntryRepository::insert_tx(&mut tx, &b)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
