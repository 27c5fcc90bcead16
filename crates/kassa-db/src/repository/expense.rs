//! # Expense Repository
//!
//! Expenses may apply a payment against a supplier credit; deleting one
//! triggers the engine's reversal cascade. The delete itself is a `_tx`
//! method so it commits (or rolls back) together with that cascade.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kassa_core::types::Expense;
use kassa_core::Money;

const EXPENSE_COLUMNS: &str = "id, tenant_id, reference_number, amount, supplier_credit_id, \
     goods_receipt_id, credit_payment_amount, spent_on, description, created_at";

// =============================================================================
// New Expense Input
// =============================================================================

/// Input for recording an expense. The reference number is allocated by
/// the engine before insertion.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub tenant_id: String,
    pub reference_number: String,
    pub amount: Money,
    pub supplier_credit_id: Option<String>,
    pub goods_receipt_id: Option<String>,
    pub credit_payment_amount: Option<Money>,
    pub spent_on: NaiveDate,
    pub description: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for expenses.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Inserts a new expense inside an open transaction and returns it.
    pub async fn insert_tx(conn: &mut SqliteConnection, new: NewExpense) -> DbResult<Expense> {
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            tenant_id: new.tenant_id,
            reference_number: new.reference_number,
            amount: new.amount,
            supplier_credit_id: new.supplier_credit_id,
            goods_receipt_id: new.goods_receipt_id,
            credit_payment_amount: new.credit_payment_amount,
            spent_on: new.spent_on,
            description: new.description,
            created_at: Utc::now(),
        };

        debug!(id = %expense.id, reference = %expense.reference_number, "Inserting expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, tenant_id, reference_number, amount, supplier_credit_id,
                goods_receipt_id, credit_payment_amount, spent_on, description,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.tenant_id)
        .bind(&expense.reference_number)
        .bind(expense.amount)
        .bind(&expense.supplier_credit_id)
        .bind(&expense.goods_receipt_id)
        .bind(expense.credit_payment_amount)
        .bind(expense.spent_on)
        .bind(&expense.description)
        .bind(expense.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(expense)
    }

    /// Gets an expense by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(expense)
    }

    /// Fetches an expense or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<Expense> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Expense", id))
    }

    /// Gets an expense inside an open transaction.
    pub async fn get_by_id_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(expense)
    }

    /// Deletes an expense inside the cascade transaction.
    pub async fn delete_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
