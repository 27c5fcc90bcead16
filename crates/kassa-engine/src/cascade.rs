//! # Expense Service and Deletion Cascade
//!
//! Expenses may apply part of their amount as a payment against a
//! supplier credit. Creating and deleting such an expense are the two
//! halves of one consistency contract:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_expense (one transaction)                                       │
//! │    allocate EXP number ── insert expense ── apply credit payment        │
//! │                                              └─► receipt propagation    │
//! │                                                                         │
//! │  delete_expense (one transaction)                                       │
//! │    reverse exactly credit_payment_amount ── restore receipt status      │
//! │    ── append reversal audit record citing the expense ── delete row     │
//! │                                                                         │
//! │  Any step failing rolls the whole operation back: an expense never      │
//! │  disappears while its payment stays applied, and vice versa.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::ledger::LedgerEngine;
use kassa_core::refnum::{self, Scope, DEFAULT_SEQ_WIDTH};
use kassa_core::types::Expense;
use kassa_core::{validation, CoreError, Money};
use kassa_db::repository::expense::ExpenseRepository;
use kassa_db::repository::sequence::SequenceRepository;
use kassa_db::{Database, NewExpense};

/// Unscoped sequence prefix for expense numbers ("EXP000007").
const EXPENSE_PREFIX: &str = "EXP";

// =============================================================================
// Expense Request
// =============================================================================

/// What a caller asks the expense service to record.
#[derive(Debug, Clone)]
pub struct ExpenseRequest {
    pub tenant_id: String,
    pub amount: Money,
    /// Supplier credit to pay down, together with the portion applied.
    pub supplier_credit_id: Option<String>,
    pub goods_receipt_id: Option<String>,
    pub credit_payment_amount: Option<Money>,
    pub spent_on: NaiveDate,
    pub description: Option<String>,
}

// =============================================================================
// Expense Service
// =============================================================================

/// Records expenses and runs the deletion reversal cascade.
#[derive(Clone)]
pub struct ExpenseService {
    db: Database,
}

impl ExpenseService {
    /// Creates a new ExpenseService.
    pub fn new(db: Database) -> Self {
        ExpenseService { db }
    }

    /// Records an expense, applying its credit payment if one is
    /// attached.
    ///
    /// The expense row, the ledger mutation, and the receipt
    /// propagation commit together. A rejected payment (overpayment)
    /// rolls the expense insert back too.
    pub async fn record_expense(&self, request: ExpenseRequest) -> EngineResult<Expense> {
        validation::require_positive("amount", request.amount).map_err(CoreError::from)?;
        if let Some(portion) = request.credit_payment_amount {
            validation::require_positive("credit_payment_amount", portion)
                .map_err(CoreError::from)?;
            if request.supplier_credit_id.is_none() {
                return Err(EngineError::Core(CoreError::Validation(
                    kassa_core::ValidationError::Required {
                        field: "supplier_credit_id",
                    },
                )));
            }
        }

        let mut tx = self.db.pool().begin().await?;

        let seq =
            SequenceRepository::next_tx(&mut tx, &request.tenant_id, EXPENSE_PREFIX, "").await?;
        let reference_number =
            refnum::format_reference(EXPENSE_PREFIX, Scope::None, seq, DEFAULT_SEQ_WIDTH);

        let expense = ExpenseRepository::insert_tx(
            &mut tx,
            NewExpense {
                tenant_id: request.tenant_id,
                reference_number,
                amount: request.amount,
                supplier_credit_id: request.supplier_credit_id.clone(),
                goods_receipt_id: request.goods_receipt_id,
                credit_payment_amount: request.credit_payment_amount,
                spent_on: request.spent_on,
                description: request.description,
            },
        )
        .await?;

        if let (Some(credit_id), Some(portion)) =
            (&request.supplier_credit_id, request.credit_payment_amount)
        {
            LedgerEngine::apply_payment_tx(
                &mut tx,
                credit_id,
                portion,
                expense.spent_on,
                Some(format!("expense {}", expense.reference_number)),
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            expense_id = %expense.id,
            reference = %expense.reference_number,
            amount = %expense.amount,
            "Expense recorded"
        );
        Ok(expense)
    }

    /// Deletes an expense, reversing its credit payment.
    ///
    /// Reverses exactly `credit_payment_amount` (not `amount` — the
    /// expense may only partly have gone to the credit), restores the
    /// linked receipt's payment status, appends a reversal audit record
    /// citing the expense, and removes the expense row. One
    /// transaction.
    pub async fn delete_expense(&self, expense_id: &str) -> EngineResult<Expense> {
        let mut tx = self.db.pool().begin().await?;

        let expense = ExpenseRepository::get_by_id_tx(&mut tx, expense_id)
            .await?
            .ok_or_else(|| kassa_db::DbError::not_found("Expense", expense_id))?;

        if let (Some(credit_id), Some(portion)) =
            (&expense.supplier_credit_id, expense.credit_payment_amount)
        {
            LedgerEngine::reverse_payment_tx(
                &mut tx,
                credit_id,
                portion,
                Some(format!("reversal of expense {}", expense.reference_number)),
            )
            .await?;
        }

        ExpenseRepository::delete_tx(&mut tx, expense_id).await?;
        tx.commit().await?;

        info!(
            expense_id,
            reference = %expense.reference_number,
            reversed = ?expense.credit_payment_amount,
            "Expense deleted"
        );
        Ok(expense)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kassa_core::types::{
        CounterpartyKind, CreditStatus, EntryKind, GoodsReceipt, ReceiptPaymentStatus,
    };
    use kassa_core::PaymentError;
    use kassa_db::{DbConfig, NewCreditEntry};

    async fn setup() -> (Database, LedgerEngine, ExpenseService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (
            db.clone(),
            LedgerEngine::new(db.clone()),
            ExpenseService::new(db),
        )
    }

    fn spent_on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 10).unwrap()
    }

    /// Supplier credit of 1000.00 linked to a receipt, as the cascade
    /// scenarios use it.
    async fn linked_credit(db: &Database, ledger: &LedgerEngine) -> String {
        db.receipts()
            .insert(&GoodsReceipt {
                id: "gr-1".into(),
                tenant_id: "t-1".into(),
                supplier_id: "sup-1".into(),
                reference_number: "GR-2026-000001".into(),
                total: Money::from_qepik(100_000),
                payment_status: ReceiptPaymentStatus::Unpaid,
                received_at: Utc::now(),
            })
            .await
            .unwrap();

        ledger
            .create_credit(NewCreditEntry {
                tenant_id: "t-1".into(),
                counterparty_kind: CounterpartyKind::Supplier,
                counterparty_id: "sup-1".into(),
                branch_id: None,
                kind: EntryKind::Credit,
                amount: Money::from_qepik(100_000),
                credit_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                due_date: None,
                goods_receipt_id: Some("gr-1".into()),
                description: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_expense_applies_payment_and_propagates() {
        let (db, ledger, expenses) = setup().await;
        let credit_id = linked_credit(&db, &ledger).await;

        let expense = expenses
            .record_expense(ExpenseRequest {
                tenant_id: "t-1".into(),
                amount: Money::from_qepik(40_000),
                supplier_credit_id: Some(credit_id.clone()),
                goods_receipt_id: Some("gr-1".into()),
                credit_payment_amount: Some(Money::from_qepik(40_000)),
                spent_on: spent_on(),
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(expense.reference_number, "EXP000001");

        let entry = db.credits().require(&credit_id).await.unwrap();
        assert_eq!(entry.remaining, Money::from_qepik(60_000));
        assert_eq!(entry.status, CreditStatus::Partial);
        assert_eq!(
            db.receipts().require("gr-1").await.unwrap().payment_status,
            ReceiptPaymentStatus::Partial
        );
    }

    #[tokio::test]
    async fn test_delete_reverses_exactly_the_credit_portion() {
        let (db, ledger, expenses) = setup().await;
        let credit_id = linked_credit(&db, &ledger).await;

        // 50.00 expense, only 40.00 of it against the credit
        let expense = expenses
            .record_expense(ExpenseRequest {
                tenant_id: "t-1".into(),
                amount: Money::from_qepik(50_000),
                supplier_credit_id: Some(credit_id.clone()),
                goods_receipt_id: Some("gr-1".into()),
                credit_payment_amount: Some(Money::from_qepik(40_000)),
                spent_on: spent_on(),
                description: None,
            })
            .await
            .unwrap();

        expenses.delete_expense(&expense.id).await.unwrap();

        let entry = db.credits().require(&credit_id).await.unwrap();
        assert_eq!(entry.remaining, Money::from_qepik(100_000));
        assert_eq!(entry.status, CreditStatus::Pending);
        assert_eq!(
            db.receipts().require("gr-1").await.unwrap().payment_status,
            ReceiptPaymentStatus::Unpaid
        );

        // The audit trail keeps both halves, citing the expense
        let history = ledger.payment_history(&credit_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, Money::from_qepik(40_000));
        assert_eq!(history[1].amount, Money::from_qepik(-40_000));
        assert_eq!(
            history[1].description.as_deref(),
            Some("reversal of expense EXP000001")
        );
        assert!(ledger.audit(&credit_id).await.unwrap());

        assert!(db.expenses().get_by_id(&expense.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_payment_rolls_expense_back() {
        let (db, ledger, expenses) = setup().await;
        let credit_id = linked_credit(&db, &ledger).await;

        let err = expenses
            .record_expense(ExpenseRequest {
                tenant_id: "t-1".into(),
                amount: Money::from_qepik(200_000),
                supplier_credit_id: Some(credit_id.clone()),
                goods_receipt_id: None,
                credit_payment_amount: Some(Money::from_qepik(200_000)), // > remaining
                spent_on: spent_on(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Payment(PaymentError::ExceedsRemaining { .. })
        ));

        // Nothing persisted: no expense, untouched balance, empty history
        let entry = db.credits().require(&credit_id).await.unwrap();
        assert_eq!(entry.remaining, Money::from_qepik(100_000));
        assert!(ledger.payment_history(&credit_id).await.unwrap().is_empty());
        // The next expense still gets the first number
        let expense = expenses
            .record_expense(ExpenseRequest {
                tenant_id: "t-1".into(),
                amount: Money::from_qepik(5_000),
                supplier_credit_id: None,
                goods_receipt_id: None,
                credit_payment_amount: None,
                spent_on: spent_on(),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(expense.reference_number, "EXP000001");
    }

    #[tokio::test]
    async fn test_plain_expense_delete_touches_no_ledger() {
        let (db, ledger, expenses) = setup().await;
        let credit_id = linked_credit(&db, &ledger).await;

        let expense = expenses
            .record_expense(ExpenseRequest {
                tenant_id: "t-1".into(),
                amount: Money::from_qepik(5_000),
                supplier_credit_id: None,
                goods_receipt_id: None,
                credit_payment_amount: None,
                spent_on: spent_on(),
                description: Some("fuel".into()),
            })
            .await
            .unwrap();

        expenses.delete_expense(&expense.id).await.unwrap();

        assert!(ledger.payment_history(&credit_id).await.unwrap().is_empty());
        assert!(db.expenses().get_by_id(&expense.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payment_portion_without_credit_refused() {
        let (_db, _ledger, expenses) = setup().await;

        let err = expenses
            .record_expense(ExpenseRequest {
                tenant_id: "t-1".into(),
                amount: Money::from_qepik(5_000),
                supplier_credit_id: None,
                goods_receipt_id: None,
                credit_payment_amount: Some(Money::from_qepik(5_000)),
                spent_on: spent_on(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(_)));
    }
}
