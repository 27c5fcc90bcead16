//! # Credit Ledger Arithmetic
//!
//! Pure payment/reversal math for credit entries.
//!
//! ## The Balance Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  amount      : immutable after creation                                 │
//! │  remaining   : amount ──payments──► 0, never negative,                  │
//! │                restored by reversals, capped at amount                  │
//! │  status      : remaining == amount → pending                            │
//! │                0 < remaining < amount → partial                         │
//! │                remaining == 0 → paid                                    │
//! │  history     : append-only signed deltas; replay reproduces remaining   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! These functions mutate an in-memory [`CreditEntry`] and return the
//! audit delta to append. Persisting both atomically (one transaction)
//! is the database layer's job — a history row without the balance
//! write, or vice versa, is a correctness bug.

use thiserror::Error;

use crate::money::Money;
use crate::types::{CreditEntry, CreditStatus};

// =============================================================================
// Payment Error
// =============================================================================

/// Why a payment was rejected. This is normal control flow, not an
/// infrastructure failure: callers must check it and report to the
/// user, and no state is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Payment amount must be strictly positive.
    #[error("payment amount must be positive")]
    NonPositiveAmount,

    /// Overpayment: the entry's remaining balance is smaller than the
    /// requested payment.
    #[error("payment of {requested} exceeds remaining balance {remaining}")]
    ExceedsRemaining {
        remaining: Money,
        requested: Money,
    },
}

// =============================================================================
// Status Derivation
// =============================================================================

/// Recomputes the entry status from its balance. Single source of the
/// pending/partial/paid thresholds.
pub fn status_for(remaining: Money, amount: Money) -> CreditStatus {
    if remaining.is_zero() {
        CreditStatus::Paid
    } else if remaining >= amount {
        CreditStatus::Pending
    } else {
        CreditStatus::Partial
    }
}

// =============================================================================
// Payment Application
// =============================================================================

/// Validates a payment without mutating anything.
pub fn validate_payment(entry: &CreditEntry, amount: Money) -> Result<(), PaymentError> {
    if !amount.is_positive() {
        return Err(PaymentError::NonPositiveAmount);
    }
    if amount > entry.remaining {
        return Err(PaymentError::ExceedsRemaining {
            remaining: entry.remaining,
            requested: amount,
        });
    }
    Ok(())
}

/// Applies a payment: decreases `remaining`, recomputes `status`.
///
/// On rejection the entry is untouched. The returned delta (positive)
/// must be appended to the payment history in the same transaction.
pub fn apply_payment(entry: &mut CreditEntry, amount: Money) -> Result<Money, PaymentError> {
    validate_payment(entry, amount)?;

    // validate_payment guarantees the subtraction cannot go negative
    entry.remaining = entry
        .remaining
        .checked_sub_to_zero(amount)
        .ok_or(PaymentError::ExceedsRemaining {
            remaining: entry.remaining,
            requested: amount,
        })?;
    entry.status = status_for(entry.remaining, entry.amount);

    Ok(amount)
}

/// Reverses a payment: restores `remaining` (capped at the original
/// amount), recomputes `status`.
///
/// Triggered when the transaction that applied the payment (an expense)
/// is deleted. The returned delta (negative) must be appended to the
/// payment history in the same transaction.
pub fn reverse_payment(entry: &mut CreditEntry, amount: Money) -> Money {
    entry.remaining = (entry.remaining + amount.abs()).min(entry.amount);
    entry.status = status_for(entry.remaining, entry.amount);

    -amount.abs()
}

// =============================================================================
// Audit Replay
// =============================================================================

/// Replays the ordered history against the original amount.
///
/// Integrity checks and tests assert this equals the stored
/// `remaining`; divergence means a balance write and a history append
/// were not atomic.
pub fn replay_remaining(amount: Money, history_deltas: &[Money]) -> Money {
    let paid: Money = history_deltas
        .iter()
        .fold(Money::zero(), |acc, delta| acc + *delta);
    (amount - paid).min(amount)
}

// =============================================================================
// Unit Tests
// =============================================================================
