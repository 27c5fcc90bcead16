//! # Stored-Value Card State Machine
//!
//! Lifecycle transitions and balance mutations for gift/loyalty cards.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  FREE ──issue──► CONFIGURED ──activate──► ACTIVE ──┬──► DEPLETED        │
//! │                      ▲                      │      ├──► EXPIRED         │
//! │                      │                      │      └──► INACTIVE        │
//! │                      └──────── reset ───────┴──(also from DEPLETED)     │
//! │                                                                         │
//! │  reset_for_resale clears: balance, customer, activation date,           │
//! │  fiscal linkage — the physical card goes back on the shelf              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The balance is a derived ledger: every mutation goes through
//! [`apply_transaction`], which records balance_before/balance_after —
//! parallel to the credit entries' payment history.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::money::Money;
use crate::types::{CardState, CardTransaction, CardTransactionKind, StoredValueCard};

// =============================================================================
// Card Error
// =============================================================================

/// Why a card operation was refused. No state is written on refusal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    /// The operation is not legal in the card's current state.
    #[error("card {card_id} is {state:?}, cannot {action}")]
    InvalidState {
        card_id: String,
        state: CardState,
        action: &'static str,
    },

    /// Redemption larger than the stored balance.
    #[error("card {card_id}: insufficient balance (have {balance}, need {requested})")]
    InsufficientBalance {
        card_id: String,
        balance: Money,
        requested: Money,
    },

    /// Value-moving operations need a positive amount.
    #[error("card amount must be positive")]
    NonPositiveAmount,
}

// =============================================================================
// Transaction Application
// =============================================================================

/// Applies one transaction to an in-memory card: validates state
/// legality and balance bounds, mutates state/balance, and returns the
/// audit record. Card row and transaction row must be persisted in the
/// same database transaction.
pub fn apply_transaction(
    card: &mut StoredValueCard,
    kind: CardTransactionKind,
    amount: Money,
    description: Option<String>,
    now: DateTime<Utc>,
) -> Result<CardTransaction, CardError> {
    let balance_before = card.balance;

    match kind {
        CardTransactionKind::Issue => {
            require_state(card, CardState::Free, "issue")?;
            require_positive(amount)?;
            card.balance = amount;
            card.state = CardState::Configured;
        }

        CardTransactionKind::Activate => {
            require_state(card, CardState::Configured, "activate")?;
            card.state = CardState::Active;
            card.activated_at = Some(now);
        }

        CardTransactionKind::Redeem => {
            require_state(card, CardState::Active, "redeem")?;
            require_positive(amount)?;
            card.balance = card.balance.checked_sub_to_zero(amount).ok_or(
                CardError::InsufficientBalance {
                    card_id: card.id.clone(),
                    balance: card.balance,
                    requested: amount,
                },
            )?;
            if card.balance.is_zero() {
                card.state = CardState::Depleted;
            }
        }

        CardTransactionKind::Refund => {
            if card.state != CardState::Active && card.state != CardState::Depleted {
                return Err(invalid_state(card, "refund"));
            }
            require_positive(amount)?;
            card.balance += amount;
            card.state = CardState::Active;
        }

        CardTransactionKind::Adjust => {
            if card.state != CardState::Configured && card.state != CardState::Active {
                return Err(invalid_state(card, "adjust"));
            }
            // Signed correction, but the balance may not go negative
            let adjusted = card.balance + amount;
            if adjusted.is_negative() {
                return Err(CardError::InsufficientBalance {
                    card_id: card.id.clone(),
                    balance: card.balance,
                    requested: amount.abs(),
                });
            }
            card.balance = adjusted;
        }

        CardTransactionKind::Expire => {
            require_state(card, CardState::Active, "expire")?;
            card.state = CardState::Expired;
        }

        CardTransactionKind::Cancel => {
            if card.state != CardState::Configured && card.state != CardState::Active {
                return Err(invalid_state(card, "cancel"));
            }
            card.state = CardState::Inactive;
        }

        CardTransactionKind::Reset => {
            if card.state != CardState::Active && card.state != CardState::Depleted {
                return Err(invalid_state(card, "reset for resale"));
            }
            card.balance = Money::zero();
            card.customer_id = None;
            card.activated_at = None;
            card.fiscal_job_id = None;
            card.state = CardState::Configured;
        }
    }

    card.updated_at = now;

    Ok(CardTransaction {
        id: Uuid::new_v4().to_string(),
        card_id: card.id.clone(),
        kind,
        amount,
        balance_before,
        balance_after: card.balance,
        description,
        created_at: now,
    })
}

fn require_state(
    card: &StoredValueCard,
    expected: CardState,
    action: &'static str,
) -> Result<(), CardError> {
    if card.state == expected {
        Ok(())
    } else {
        Err(invalid_state(card, action))
    }
}

fn invalid_state(card: &StoredValueCard, action: &'static str) -> CardError {
    CardError::InvalidState {
        card_id: card.id.clone(),
        state: card.state,
        action,
    }
}

fn require_positive(amount: Money) -> Result<(), CardError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(CardError::NonPositiveAmount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CardKind;

    fn card(state: CardState, balance: i64) -> StoredValueCard {
        StoredValueCard {
            id: "card-1".into(),
            tenant_id: "t-1".into(),
            kind: CardKind::Gift,
            code: "GC-0001".into(),
            state,
            balance: Money::from_qepik(balance),
            customer_id: None,
            activated_at: None,
            expires_at: None,
            fiscal_job_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_then_activate() {
        let mut c = card(CardState::Free, 0);
        let now = Utc::now();

        let txn =
            apply_transaction(&mut c, CardTransactionKind::Issue, Money::from_qepik(5000), None, now)
                .unwrap();
        assert_eq!(c.state, CardState::Configured);
        assert_eq!(txn.balance_before, Money::zero());
        assert_eq!(txn.balance_after.qepik(), 5000);

        apply_transaction(&mut c, CardTransactionKind::Activate, Money::zero(), None, now)
            .unwrap();
        assert_eq!(c.state, CardState::Active);
        assert!(c.activated_at.is_some());
    }

    #[test]
    fn test_redeem_to_depletion() {
        let mut c = card(CardState::Active, 5000);
        let now = Utc::now();

        apply_transaction(&mut c, CardTransactionKind::Redeem, Money::from_qepik(2000), None, now)
            .unwrap();
        assert_eq!(c.state, CardState::Active);
        assert_eq!(c.balance.qepik(), 3000);

        apply_transaction(&mut c, CardTransactionKind::Redeem, Money::from_qepik(3000), None, now)
            .unwrap();
        assert_eq!(c.state, CardState::Depleted);
        assert!(c.balance.is_zero());
    }

    #[test]
    fn test_redeem_beyond_balance_refused() {
        let mut c = card(CardState::Active, 1000);
        let err = apply_transaction(
            &mut c,
            CardTransactionKind::Redeem,
            Money::from_qepik(1001),
            None,
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, CardError::InsufficientBalance { .. }));
        assert_eq!(c.balance.qepik(), 1000);
        assert_eq!(c.state, CardState::Active);
    }

    #[test]
    fn test_redeem_requires_active() {
        let mut c = card(CardState::Configured, 1000);
        let err = apply_transaction(
            &mut c,
            CardTransactionKind::Redeem,
            Money::from_qepik(100),
            None,
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, CardError::InvalidState { .. }));
    }

    #[test]
    fn test_refund_revives_depleted_card() {
        let mut c = card(CardState::Depleted, 0);
        apply_transaction(
            &mut c,
            CardTransactionKind::Refund,
            Money::from_qepik(500),
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(c.state, CardState::Active);
        assert_eq!(c.balance.qepik(), 500);
    }

    #[test]
    fn test_reset_for_resale_clears_everything() {
        let now = Utc::now();
        let mut c = card(CardState::Depleted, 0);
        c.customer_id = Some("cust-1".into());
        c.activated_at = Some(now);
        c.fiscal_job_id = Some("job-1".into());

        let txn =
            apply_transaction(&mut c, CardTransactionKind::Reset, Money::zero(), None, now)
                .unwrap();

        assert_eq!(c.state, CardState::Configured);
        assert!(c.balance.is_zero());
        assert!(c.customer_id.is_none());
        assert!(c.activated_at.is_none());
        assert!(c.fiscal_job_id.is_none());
        assert_eq!(txn.kind, CardTransactionKind::Reset);
    }

    #[test]
    fn test_reset_refused_from_expired() {
        let mut c = card(CardState::Expired, 0);
        assert!(apply_transaction(
            &mut c,
            CardTransactionKind::Reset,
            Money::zero(),
            None,
            Utc::now()
        )
        .is_err());
    }

    #[test]
    fn test_adjust_cannot_go_negative() {
        let mut c = card(CardState::Active, 300);
        let err = apply_transaction(
            &mut c,
            CardTransactionKind::Adjust,
            Money::from_qepik(-400),
            None,
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, CardError::InsufficientBalance { .. }));
        assert_eq!(c.balance.qepik(), 300);
    }
}
