//! # Domain Types
//!
//! Core domain types for the fiscal back-office engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │   FiscalJob     │   │   CreditEntry   │   │  GoodsReceipt   │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  operation      │   │  amount (fixed) │   │  payment_status │        │
//! │  │  status         │   │  remaining      │   │  (derived from  │        │
//! │  │  retry_count    │   │  status         │   │   linked credit)│        │
//! │  │  fiscal_number  │   │  reference_no   │   │                 │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │ CreditPayment   │   │ StoredValueCard │   │TenantFiscalConf │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  signed delta   │   │  state machine  │   │  shift_open     │        │
//! │  │  (append-only)  │   │  balance ledger │   │  opened_at      │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (reference_number, fiscal_number, card code) -
//!   human-readable, issued by this system or the fiscal device
//!
//! ## fiscal_number vs fiscal_document_id
//! These are distinct identifiers and are never interchanged:
//! - `fiscal_number`: the human-readable receipt number printed on paper
//! - `fiscal_document_id`: the vendor's opaque document hash

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Fiscal Operations
// =============================================================================

/// Every operation a fiscal job can ask the bridge to perform.
///
/// Sale/Return fiscalize a document and must reference exactly one of
/// sale_id or return_id. Shift and printer-maintenance operations carry
/// no document reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FiscalOperation {
    /// Fiscalize a completed sale.
    Sale,
    /// Fiscalize a return against an earlier sale.
    Return,
    /// Open a device shift.
    ShiftOpen,
    /// Close a device shift (Z-report).
    ShiftClose,
    /// Query the device's own shift state.
    ShiftStatus,
    /// X-report (shift snapshot without closing).
    ShiftXReport,
    /// Fiscalize a payment against a customer credit.
    CreditPay,
    /// Advance sale (prepayment document).
    AdvanceSale,
    /// Advance sale with itemized lines.
    AdvanceSaleItems,
    /// Payment against an earlier advance.
    AdvancePay,
    /// Cash deposit into the drawer.
    Deposit,
    /// Cash withdrawal from the drawer.
    Withdraw,
    /// Open the cash drawer without a document.
    OpenCashbox,
    /// Correction document.
    Correction,
    /// Roll back the last fiscal document.
    Rollback,
    /// Reprint the last document.
    PrintLast,
    /// Probe the printer connection.
    PrinterConnection,
    /// Periodic (date-range) report.
    PeriodicReport,
    /// Control tape printout.
    ControlTape,
    /// Log the cashier out of the device.
    Logout,
}

impl FiscalOperation {
    /// Whether this operation must reference exactly one sale or return.
    pub fn requires_document_ref(&self) -> bool {
        matches!(self, FiscalOperation::Sale | FiscalOperation::Return)
    }

    /// Whether completion of this operation mutates tenant shift state.
    pub fn is_shift_operation(&self) -> bool {
        matches!(
            self,
            FiscalOperation::ShiftOpen
                | FiscalOperation::ShiftClose
                | FiscalOperation::ShiftStatus
        )
    }
}

// =============================================================================
// Job Status
// =============================================================================

/// Lifecycle status of a fiscal job.
///
/// ```text
/// pending ──► processing ──► completed
///    ▲             │
///    │             ▼
///    └───retry─── failed   (retriable && retry_count < 3)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be picked up by the bridge.
    Pending,
    /// Claimed by a bridge poller; device call in flight.
    Processing,
    /// Device confirmed. Terminal.
    Completed,
    /// Device or network failed. Terminal unless retried.
    Failed,
}

// =============================================================================
// Fiscal Job
// =============================================================================

/// One durable request to a fiscal device.
///
/// This record is the wire contract between the server and the bridge:
/// the bridge polls for pending jobs, executes the vendor protocol, and
/// reports completion or failure back. `request_data`/`response_data`
/// are opaque vendor-specific JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FiscalJob {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this job belongs to. Jobs are never cross-tenant visible.
    pub tenant_id: String,

    /// Originating sale, for operation=sale. Mutually exclusive with
    /// `return_id`.
    pub sale_id: Option<String>,

    /// Originating return, for operation=return.
    pub return_id: Option<String>,

    /// What the bridge should ask the device to do.
    pub operation: FiscalOperation,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Vendor-specific request payload (opaque JSON text).
    pub request_data: Option<String>,

    /// Vendor-specific response payload (opaque JSON text).
    pub response_data: Option<String>,

    /// Fiscal vendor/provider identifier (selects protocol and error
    /// vocabulary).
    pub provider: String,

    /// Human-readable receipt number returned by the device.
    pub fiscal_number: Option<String>,

    /// Vendor document hash. Distinct from `fiscal_number`.
    pub fiscal_document_id: Option<String>,

    /// Last failure message, populated for operator tooling.
    pub error_message: Option<String>,

    /// Number of failures recorded so far.
    pub retry_count: i64,

    /// Earliest time a re-enqueued job may be offered to the bridge
    /// again. A hint for the external scheduler; nothing in this core
    /// blocks on it.
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Whether the last failure was classified as retriable.
    pub is_retriable: bool,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When a bridge claimed the job.
    pub picked_up_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state (completed or failed).
    pub completed_at: Option<DateTime<Utc>>,
}

/// Reference to the document a sale/return job fiscalizes.
///
/// Exactly one of sale or return — the type makes "both" unrepresentable,
/// which is the invariant the fiscal-number writeback relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentRef {
    /// A completed sale.
    Sale(String),
    /// A sale return.
    Return(String),
}

impl DocumentRef {
    /// The referenced document id, whichever side it is.
    pub fn id(&self) -> &str {
        match self {
            DocumentRef::Sale(id) | DocumentRef::Return(id) => id,
        }
    }
}

// =============================================================================
// Tenant Fiscal Configuration
// =============================================================================

/// Per-tenant fiscal device configuration aggregate.
///
/// Shift state is owned by the physical device; this record is the local
/// mirror, reconciled by the shift synchronizer. All reads and writes go
/// through the synchronizer's reconcile operation — never ambient global
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TenantFiscalConfig {
    /// Tenant this configuration belongs to.
    pub tenant_id: String,

    /// Fiscal vendor/provider identifier.
    pub provider: String,

    /// Local mirror of the device's shift-open flag.
    pub shift_open: bool,

    /// When the current shift was opened, if open.
    pub shift_opened_at: Option<DateTime<Utc>>,

    /// When the last Z-report (shift close) completed.
    pub last_z_report_at: Option<DateTime<Utc>>,

    /// Fixed business timezone as minutes east of UTC (Baku = +240).
    /// Device shift reports carry local wall-clock times in this zone.
    pub tz_offset_minutes: i64,

    /// Last reconcile/update time.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Credit Ledger
// =============================================================================

/// Who the credit entry is against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyKind {
    /// A customer owing us (sale on credit).
    Customer,
    /// A supplier we owe (goods receipt on credit).
    Supplier,
}

/// Whether the entry opens a balance or records a standalone payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Opens a balance that is paid down over time.
    Credit,
    /// A standalone payment record (no running balance).
    Payment,
}

/// Repayment status of a credit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CreditStatus {
    /// Untouched: remaining == amount.
    Pending,
    /// Partially paid: 0 < remaining < amount.
    Partial,
    /// Fully paid: remaining == 0.
    Paid,
}

/// A customer or supplier credit entry with a running balance.
///
/// `amount` is immutable after creation. `remaining` only moves through
/// [`crate::ledger::apply_payment`] / [`crate::ledger::reverse_payment`],
/// each of which appends a [`CreditPayment`] so that replaying the
/// history always reproduces `remaining`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CreditEntry {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this entry belongs to.
    pub tenant_id: String,

    /// Customer or supplier.
    pub counterparty_kind: CounterpartyKind,

    /// The customer/supplier id.
    pub counterparty_id: String,

    /// Branch that originated the entry.
    pub branch_id: Option<String>,

    /// Credit (running balance) or standalone payment.
    pub kind: EntryKind,

    /// Original amount. Immutable after creation.
    pub amount: Money,

    /// Outstanding balance. Starts equal to `amount`, only decreases
    /// (payments) or is restored (reversals), never negative.
    pub remaining: Money,

    /// Derived from `remaining` vs `amount` on every mutation.
    pub status: CreditStatus,

    /// When the credit was granted.
    pub credit_date: NaiveDate,

    /// When the balance falls due.
    pub due_date: Option<NaiveDate>,

    /// Tenant+year scoped human-readable number (e.g. "SC-2025-000123").
    /// Generated once at creation, never regenerated.
    pub reference_number: String,

    /// 1:1 link to a goods receipt (supplier credits only). When set,
    /// the receipt's payment_status is derived from this entry.
    pub goods_receipt_id: Option<String>,

    /// Free-form note.
    pub description: Option<String>,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,

    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}

/// One append-only audit record of a balance mutation.
///
/// Positive `amount` is a payment, negative is a reversal. The ordered
/// history is the audit trail: `amount − Σ history == remaining` always.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CreditPayment {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The credit entry this delta applies to.
    pub entry_id: String,

    /// Signed delta: + payment, − reversal.
    pub amount: Money,

    /// Business date of the payment.
    pub paid_on: NaiveDate,

    /// Why this delta exists (reversals cite the deleted expense).
    pub description: Option<String>,

    /// When the record was appended.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Goods Receipt
// =============================================================================

/// Derived payment status of a goods receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ReceiptPaymentStatus {
    /// Nothing paid yet.
    Unpaid,
    /// Some but not all of the linked credit is paid.
    Partial,
    /// Linked credit fully paid.
    Paid,
}

impl ReceiptPaymentStatus {
    /// Derives the receipt status purely from the linked credit's
    /// balance. This is the single source of the mapping — the stored
    /// column is a cache of this function, never independent state.
    pub fn derive(remaining: Money, amount: Money) -> Self {
        if remaining.is_zero() {
            ReceiptPaymentStatus::Paid
        } else if remaining >= amount {
            ReceiptPaymentStatus::Unpaid
        } else {
            ReceiptPaymentStatus::Partial
        }
    }
}

/// A goods receipt from a supplier.
///
/// `payment_status` is derived, not independently stored fact: it is
/// recomputed from the linked supplier credit on every ledger mutation
/// and must never drift from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GoodsReceipt {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this receipt belongs to.
    pub tenant_id: String,

    /// The supplying counterparty.
    pub supplier_id: String,

    /// Human-readable receipt number.
    pub reference_number: String,

    /// Total receipt value.
    pub total: Money,

    /// Cached derivation of the linked credit's balance.
    pub payment_status: ReceiptPaymentStatus,

    /// When the goods were received.
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Expense
// =============================================================================

/// An expense, optionally applying a payment against a supplier credit.
///
/// Deleting an expense that carried a `credit_payment_amount` must
/// reverse exactly that payment and cascade into the linked receipt's
/// payment status — see the engine's cascade service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this expense belongs to.
    pub tenant_id: String,

    /// Human-readable expense number (cited in reversal audit records).
    pub reference_number: String,

    /// Total expense amount.
    pub amount: Money,

    /// Supplier credit this expense paid down, if any.
    pub supplier_credit_id: Option<String>,

    /// Goods receipt this expense paid against, if any.
    pub goods_receipt_id: Option<String>,

    /// The exact portion applied to the supplier credit.
    pub credit_payment_amount: Option<Money>,

    /// Business date of the expense.
    pub spent_on: NaiveDate,

    /// Free-form note.
    pub description: Option<String>,

    /// When the expense was recorded.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stored-Value Cards
// =============================================================================

/// Gift card or loyalty card — structurally identical instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    /// Prepaid stored value.
    Gift,
    /// Accumulated loyalty points.
    Loyalty,
}

/// Lifecycle state of a stored-value card.
///
/// ```text
/// free ──► configured ──► active ──► { depleted | expired | inactive }
///              ▲                          │
///              └────── reset_for_resale ──┘   (active/depleted only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CardState {
    /// Blank stock, never configured.
    Free,
    /// Face value loaded, not yet sold/activated.
    Configured,
    /// In a customer's hands, redeemable.
    Active,
    /// Balance reached zero through redemption.
    Depleted,
    /// Validity window elapsed.
    Expired,
    /// Administratively cancelled.
    Inactive,
}

/// A stored-value instrument (gift or loyalty card).
///
/// `balance` is a derived ledger, not a free-standing mutable field: it
/// only moves through a [`CardTransaction`] recording balance_before
/// and balance_after — exactly parallel to the credit entries above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StoredValueCard {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this card belongs to.
    pub tenant_id: String,

    /// Gift or loyalty.
    pub kind: CardKind,

    /// The printed/engraved card code.
    pub code: String,

    /// Current lifecycle state.
    pub state: CardState,

    /// Current stored value. Mutated only via transactions.
    pub balance: Money,

    /// Holder, once activated.
    pub customer_id: Option<String>,

    /// When the card was activated.
    pub activated_at: Option<DateTime<Utc>>,

    /// When the card expires, if bounded.
    pub expires_at: Option<DateTime<Utc>>,

    /// Fiscal job that registered the card sale, if fiscalized.
    pub fiscal_job_id: Option<String>,

    /// When the card record was created.
    pub created_at: DateTime<Utc>,

    /// When the card last changed.
    pub updated_at: DateTime<Utc>,
}

/// What a card transaction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CardTransactionKind {
    /// Load face value onto blank stock (free → configured).
    Issue,
    /// Hand to a customer (configured → active).
    Activate,
    /// Spend stored value.
    Redeem,
    /// Return value after a refund.
    Refund,
    /// Manual balance correction.
    Adjust,
    /// Validity elapsed (active → expired).
    Expire,
    /// Administrative cancellation.
    Cancel,
    /// Clear for resale (active/depleted → configured).
    Reset,
}

/// Append-only record of a card balance/state mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CardTransaction {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The card this transaction applies to.
    pub card_id: String,

    /// What happened.
    pub kind: CardTransactionKind,

    /// Signed value moved (zero for pure state changes).
    pub amount: Money,

    /// Balance before the mutation.
    pub balance_before: Money,

    /// Balance after the mutation.
    pub balance_after: Money,

    /// Free-form note.
    pub description: Option<String>,

    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_document_ref() {
        assert!(FiscalOperation::Sale.requires_document_ref());
        assert!(FiscalOperation::Return.requires_document_ref());
        assert!(!FiscalOperation::ShiftOpen.requires_document_ref());
        assert!(!FiscalOperation::OpenCashbox.requires_document_ref());
    }

    #[test]
    fn test_shift_operations() {
        assert!(FiscalOperation::ShiftOpen.is_shift_operation());
        assert!(FiscalOperation::ShiftClose.is_shift_operation());
        assert!(FiscalOperation::ShiftStatus.is_shift_operation());
        assert!(!FiscalOperation::ShiftXReport.is_shift_operation());
        assert!(!FiscalOperation::Sale.is_shift_operation());
    }

    #[test]
    fn test_receipt_status_derivation() {
        let amount = Money::from_qepik(100_000);

        assert_eq!(
            ReceiptPaymentStatus::derive(amount, amount),
            ReceiptPaymentStatus::Unpaid
        );
        assert_eq!(
            ReceiptPaymentStatus::derive(Money::from_qepik(60_000), amount),
            ReceiptPaymentStatus::Partial
        );
        assert_eq!(
            ReceiptPaymentStatus::derive(Money::zero(), amount),
            ReceiptPaymentStatus::Paid
        );
    }

    #[test]
    fn test_document_ref_id() {
        assert_eq!(DocumentRef::Sale("s1".into()).id(), "s1");
        assert_eq!(DocumentRef::Return("r1".into()).id(), "r1");
    }
}
