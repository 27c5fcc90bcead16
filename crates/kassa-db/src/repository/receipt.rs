//! # Goods Receipt Repository
//!
//! `payment_status` on a receipt is a cache of the linked supplier
//! credit's balance. The only write path is `set_payment_status_tx`,
//! called from the engine inside the same transaction as the ledger
//! mutation that changed the derivation.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kassa_core::types::{GoodsReceipt, ReceiptPaymentStatus};

const RECEIPT_COLUMNS: &str =
    "id, tenant_id, supplier_id, reference_number, total, payment_status, received_at";

/// Repository for goods receipts.
#[derive(Debug, Clone)]
pub struct GoodsReceiptRepository {
    pool: SqlitePool,
}

impl GoodsReceiptRepository {
    /// Creates a new GoodsReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        GoodsReceiptRepository { pool }
    }

    /// Inserts a goods receipt.
    pub async fn insert(&self, receipt: &GoodsReceipt) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO goods_receipts (
                id, tenant_id, supplier_id, reference_number, total,
                payment_status, received_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.tenant_id)
        .bind(&receipt.supplier_id)
        .bind(&receipt.reference_number)
        .bind(receipt.total)
        .bind(receipt.payment_status)
        .bind(receipt.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Gets a receipt by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<GoodsReceipt>> {
        let receipt = sqlx::query_as::<_, GoodsReceipt>(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM goods_receipts WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(receipt)
    }

    /// Fetches a receipt or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<GoodsReceipt> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("GoodsReceipt", id))
    }

    /// Refreshes the cached payment status.
    ///
    /// Writes only when the value actually changes; returns whether a
    /// write happened.
    pub async fn set_payment_status_tx(
        conn: &mut SqliteConnection,
        id: &str,
        status: ReceiptPaymentStatus,
    ) -> DbResult<bool> {
        debug!(id, ?status, "Propagating receipt payment status");

        let result = sqlx::query(
            "UPDATE goods_receipts SET payment_status = ?2 WHERE id = ?1 AND payment_status <> ?2",
        )
        .bind(id)
        .bind(status)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
