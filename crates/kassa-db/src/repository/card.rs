//! # Stored-Value Card Repository
//!
//! Persistence for gift/loyalty cards and their append-only transaction
//! trail. A card's state and balance change only together with a new
//! transaction record, so both writes share a `_tx` pair composed into
//! one transaction by the card service (or the `record` convenience
//! here).

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kassa_core::types::{CardTransaction, StoredValueCard};

const CARD_COLUMNS: &str = "id, tenant_id, kind, code, state, balance, customer_id, \
     activated_at, expires_at, fiscal_job_id, created_at, updated_at";

/// Repository for stored-value cards.
#[derive(Debug, Clone)]
pub struct StoredValueCardRepository {
    pool: SqlitePool,
}

impl StoredValueCardRepository {
    /// Creates a new StoredValueCardRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StoredValueCardRepository { pool }
    }

    /// Inserts a new card record.
    pub async fn insert(&self, card: &StoredValueCard) -> DbResult<()> {
        debug!(id = %card.id, code = %card.code, "Inserting card");

        sqlx::query(
            r#"
            INSERT INTO stored_value_cards (
                id, tenant_id, kind, code, state, balance, customer_id,
                activated_at, expires_at, fiscal_job_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&card.id)
        .bind(&card.tenant_id)
        .bind(card.kind)
        .bind(&card.code)
        .bind(card.state)
        .bind(card.balance)
        .bind(&card.customer_id)
        .bind(card.activated_at)
        .bind(card.expires_at)
        .bind(&card.fiscal_job_id)
        .bind(card.created_at)
        .bind(card.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Gets a card by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StoredValueCard>> {
        let card = sqlx::query_as::<_, StoredValueCard>(&format!(
            "SELECT {CARD_COLUMNS} FROM stored_value_cards WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(card)
    }

    /// Fetches a card or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<StoredValueCard> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("StoredValueCard", id))
    }

    /// Looks a card up by its printed code (the POS path).
    pub async fn get_by_code(
        &self,
        tenant_id: &str,
        code: &str,
    ) -> DbResult<Option<StoredValueCard>> {
        let card = sqlx::query_as::<_, StoredValueCard>(&format!(
            "SELECT {CARD_COLUMNS} FROM stored_value_cards WHERE tenant_id = ?1 AND code = ?2"
        ))
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(card)
    }

    /// Writes the card's mutable fields after a state-machine step.
    pub async fn update_card_tx(
        conn: &mut SqliteConnection,
        card: &StoredValueCard,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE stored_value_cards SET
                state = ?2, balance = ?3, customer_id = ?4,
                activated_at = ?5, fiscal_job_id = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&card.id)
        .bind(card.state)
        .bind(card.balance)
        .bind(&card.customer_id)
        .bind(card.activated_at)
        .bind(&card.fiscal_job_id)
        .bind(card.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Appends one audit record to the card's transaction trail.
    pub async fn append_transaction_tx(
        conn: &mut SqliteConnection,
        txn: &CardTransaction,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO card_transactions (
                id, card_id, kind, amount, balance_before, balance_after,
                description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.card_id)
        .bind(txn.kind)
        .bind(txn.amount)
        .bind(txn.balance_before)
        .bind(txn.balance_after)
        .bind(&txn.description)
        .bind(txn.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Persists a mutated card together with the transaction that
    /// mutated it.
    pub async fn record(&self, card: &StoredValueCard, txn: &CardTransaction) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::update_card_tx(&mut tx, card).await?;
        Self::append_transaction_tx(&mut tx, txn).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Ordered transaction trail for a card.
    pub async fn transactions(&self, card_id: &str) -> DbResult<Vec<CardTransaction>> {
        let txns = sqlx::query_as::<_, CardTransaction>(
            r#"
            SELECT id, card_id, kind, amount, balance_before, balance_after,
                   description, created_at
            FROM card_transactions
            WHERE card_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(txns)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use kassa_core::types::{CardKind, CardState, CardTransactionKind};
    use kassa_core::Money;
    use uuid::Uuid;

    fn card(tenant: &str, code: &str) -> StoredValueCard {
        let now = Utc::now();
        StoredValueCard {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.into(),
            kind: CardKind::Gift,
            code: code.into(),
            state: CardState::Free,
            balance: Money::zero(),
            customer_id: None,
            activated_at: None,
            expires_at: None,
            fiscal_job_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_code_is_unique_per_tenant() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.cards();

        repo.insert(&card("t-1", "GC-0001")).await.unwrap();
        // Same code, other tenant: fine
        repo.insert(&card("t-2", "GC-0001")).await.unwrap();
        // Same tenant: rejected
        let err = repo.insert(&card("t-1", "GC-0001")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_record_writes_card_and_trail_atomically() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.cards();

        let mut c = card("t-1", "GC-0002");
        repo.insert(&c).await.unwrap();

        c.state = CardState::Configured;
        c.balance = Money::from_qepik(50_000);
        c.updated_at = Utc::now();
        let txn = CardTransaction {
            id: Uuid::new_v4().to_string(),
            card_id: c.id.clone(),
            kind: CardTransactionKind::Issue,
            amount: Money::from_qepik(50_000),
            balance_before: Money::zero(),
            balance_after: Money::from_qepik(50_000),
            description: None,
            created_at: Utc::now(),
        };
        repo.record(&c, &txn).await.unwrap();

        let fetched = repo.require(&c.id).await.unwrap();
        assert_eq!(fetched.state, CardState::Configured);
        assert_eq!(fetched.balance, Money::from_qepik(50_000));

        let trail = repo.transactions(&c.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, CardTransactionKind::Issue);
    }

    #[tokio::test]
    async fn test_lookup_by_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.cards();
        let c = card("t-1", "GC-0003");
        repo.insert(&c).await.unwrap();

        let found = repo.get_by_code("t-1", "GC-0003").await.unwrap().unwrap();
        assert_eq!(found.id, c.id);
        assert!(repo.get_by_code("t-2", "GC-0003").await.unwrap().is_none());
    }
}
