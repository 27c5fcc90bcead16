//! # Stored-Value Card Service
//!
//! Persists the card state machine: each operation runs the pure
//! transition from `kassa_core::card` against the stored card and
//! commits the mutated card and its audit transaction together.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::EngineResult;
use kassa_core::card::apply_transaction;
use kassa_core::types::{
    CardKind, CardState, CardTransaction, CardTransactionKind, StoredValueCard,
};
use kassa_core::{validation, CoreError, Money};
use kassa_db::Database;

/// Card lifecycle service.
#[derive(Clone)]
pub struct CardService {
    db: Database,
}

impl CardService {
    /// Creates a new CardService.
    pub fn new(db: Database) -> Self {
        CardService { db }
    }

    /// Registers blank card stock.
    pub async fn register(
        &self,
        tenant_id: &str,
        kind: CardKind,
        code: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> EngineResult<StoredValueCard> {
        validation::require_non_empty("code", code).map_err(CoreError::from)?;

        let now = Utc::now();
        let card = StoredValueCard {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            kind,
            code: code.to_string(),
            state: CardState::Free,
            balance: Money::zero(),
            customer_id: None,
            activated_at: None,
            expires_at,
            fiscal_job_id: None,
            created_at: now,
            updated_at: now,
        };
        self.db.cards().insert(&card).await?;

        info!(card_id = %card.id, code, "Card registered");
        Ok(card)
    }

    /// Loads face value onto blank stock (free → configured).
    pub async fn issue(&self, card_id: &str, amount: Money) -> EngineResult<StoredValueCard> {
        self.step(card_id, CardTransactionKind::Issue, amount, None, |_| {})
            .await
    }

    /// Hands a configured card to a customer (configured → active).
    pub async fn activate(
        &self,
        card_id: &str,
        customer_id: Option<String>,
        fiscal_job_id: Option<String>,
    ) -> EngineResult<StoredValueCard> {
        self.step(
            card_id,
            CardTransactionKind::Activate,
            Money::zero(),
            None,
            move |card| {
                card.customer_id = customer_id;
                card.fiscal_job_id = fiscal_job_id;
            },
        )
        .await
    }

    /// Spends stored value; depletion is automatic at zero.
    pub async fn redeem(
        &self,
        card_id: &str,
        amount: Money,
        description: Option<String>,
    ) -> EngineResult<StoredValueCard> {
        self.step(card_id, CardTransactionKind::Redeem, amount, description, |_| {})
            .await
    }

    /// Returns value after a refunded sale; revives a depleted card.
    pub async fn refund(
        &self,
        card_id: &str,
        amount: Money,
        description: Option<String>,
    ) -> EngineResult<StoredValueCard> {
        self.step(card_id, CardTransactionKind::Refund, amount, description, |_| {})
            .await
    }

    /// Signed manual balance correction.
    pub async fn adjust(
        &self,
        card_id: &str,
        amount: Money,
        description: Option<String>,
    ) -> EngineResult<StoredValueCard> {
        self.step(card_id, CardTransactionKind::Adjust, amount, description, |_| {})
            .await
    }

    /// Marks an active card expired.
    pub async fn expire(&self, card_id: &str) -> EngineResult<StoredValueCard> {
        self.step(card_id, CardTransactionKind::Expire, Money::zero(), None, |_| {})
            .await
    }

    /// Administrative cancellation.
    pub async fn cancel(
        &self,
        card_id: &str,
        description: Option<String>,
    ) -> EngineResult<StoredValueCard> {
        self.step(card_id, CardTransactionKind::Cancel, Money::zero(), description, |_| {})
            .await
    }

    /// Clears a used card for resale (active/depleted → configured).
    pub async fn reset_for_resale(&self, card_id: &str) -> EngineResult<StoredValueCard> {
        self.step(card_id, CardTransactionKind::Reset, Money::zero(), None, |_| {})
            .await
    }

    /// Looks a card up by its printed code.
    pub async fn find_by_code(
        &self,
        tenant_id: &str,
        code: &str,
    ) -> EngineResult<Option<StoredValueCard>> {
        Ok(self.db.cards().get_by_code(tenant_id, code).await?)
    }

    /// The card's ordered audit trail.
    pub async fn transactions(&self, card_id: &str) -> EngineResult<Vec<CardTransaction>> {
        Ok(self.db.cards().transactions(card_id).await?)
    }

    /// Runs one pure transition and persists card + audit record
    /// atomically. `extra` applies service-level field changes that are
    /// not part of the balance/state machine (holder, fiscal linkage).
    async fn step(
        &self,
        card_id: &str,
        kind: CardTransactionKind,
        amount: Money,
        description: Option<String>,
        extra: impl FnOnce(&mut StoredValueCard),
    ) -> EngineResult<StoredValueCard> {
        let mut card = self.db.cards().require(card_id).await?;
        let txn = apply_transaction(&mut card, kind, amount, description, Utc::now())?;
        extra(&mut card);
        self.db.cards().record(&card, &txn).await?;

        info!(card_id, ?kind, balance = %card.balance, state = ?card.state, "Card transaction");
        Ok(card)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
