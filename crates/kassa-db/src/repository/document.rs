//! # Fiscalized Document Repository
//!
//! Minimal projections of sales and returns: this core owns only the
//! fiscal-number writeback. The writeback is guarded so a document's
//! fiscal identity, once set, is never overwritten.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kassa_core::DocumentRef;

// =============================================================================
// Row Types
// =============================================================================

/// Sale projection: identity plus fiscal writeback columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleDoc {
    pub id: String,
    pub tenant_id: String,
    pub fiscal_number: Option<String>,
    pub fiscal_document_id: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

/// Return projection.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReturnDoc {
    pub id: String,
    pub tenant_id: String,
    pub sale_id: Option<String>,
    pub fiscal_number: Option<String>,
    pub fiscal_document_id: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale/return fiscal-number writeback.
#[derive(Debug, Clone)]
pub struct FiscalDocumentRepository {
    pool: SqlitePool,
}

impl FiscalDocumentRepository {
    /// Creates a new FiscalDocumentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FiscalDocumentRepository { pool }
    }

    /// Inserts a sale projection.
    pub async fn insert_sale(&self, id: &str, tenant_id: &str) -> DbResult<()> {
        sqlx::query("INSERT INTO sales (id, tenant_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(tenant_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a return projection, optionally linked to its sale.
    pub async fn insert_return(
        &self,
        id: &str,
        tenant_id: &str,
        sale_id: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO sale_returns (id, tenant_id, sale_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(sale_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Gets a sale projection by ID.
    pub async fn get_sale(&self, id: &str) -> DbResult<Option<SaleDoc>> {
        let sale = sqlx::query_as::<_, SaleDoc>(
            "SELECT id, tenant_id, fiscal_number, fiscal_document_id, created_at \
             FROM sales WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sale)
    }

    /// Gets a return projection by ID.
    pub async fn get_return(&self, id: &str) -> DbResult<Option<ReturnDoc>> {
        let ret = sqlx::query_as::<_, ReturnDoc>(
            "SELECT id, tenant_id, sale_id, fiscal_number, fiscal_document_id, created_at \
             FROM sale_returns WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ret)
    }

    /// Writes the device-issued fiscal identity back onto the document.
    ///
    /// Guarded on `fiscal_number IS NULL`: exactly one job completion
    /// may brand a document, a second attempt reports `false` instead
    /// of silently overwriting.
    pub async fn attach_fiscal_number_tx(
        conn: &mut SqliteConnection,
        document: &DocumentRef,
        fiscal_number: &str,
        fiscal_document_id: Option<&str>,
    ) -> DbResult<bool> {
        let (table, id) = match document {
            DocumentRef::Sale(id) => ("sales", id.as_str()),
            DocumentRef::Return(id) => ("sale_returns", id.as_str()),
        };

        debug!(table, id, fiscal_number, "Attaching fiscal number");

        let result = sqlx::query(&format!(
            "UPDATE {table} SET fiscal_number = ?2, fiscal_document_id = ?3 \
             WHERE id = ?1 AND fiscal_number IS NULL"
        ))
        .bind(id)
        .bind(fiscal_number)
        .bind(fiscal_document_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_writeback_is_once_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.documents();
        repo.insert_sale("sale-1", "t-1").await.unwrap();

        let doc = DocumentRef::Sale("sale-1".into());
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(
            FiscalDocumentRepository::attach_fiscal_number_tx(&mut conn, &doc, "FN-1", Some("H1"))
                .await
                .unwrap()
        );
        // Second writeback loses
        assert!(
            !FiscalDocumentRepository::attach_fiscal_number_tx(&mut conn, &doc, "FN-2", Some("H2"))
                .await
                .unwrap()
        );

        // Release the pool's single in-memory connection before reading
        drop(conn);

        let sale = repo.get_sale("sale-1").await.unwrap().unwrap();
        assert_eq!(sale.fiscal_number.as_deref(), Some("FN-1"));
        assert_eq!(sale.fiscal_document_id.as_deref(), Some("H1"));
    }

    #[tokio::test]
    async fn test_return_writeback() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.documents();
        repo.insert_sale("sale-1", "t-1").await.unwrap();
        repo.insert_return("ret-1", "t-1", Some("sale-1")).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let doc = DocumentRef::Return("ret-1".into());
        assert!(
            FiscalDocumentRepository::attach_fiscal_number_tx(&mut conn, &doc, "FN-R1", None)
                .await
                .unwrap()
        );

        // Release the pool's single in-memory connection before reading
        drop(conn);

        let ret = repo.get_return("ret-1").await.unwrap().unwrap();
        assert_eq!(ret.fiscal_number.as_deref(), Some("FN-R1"));
        assert_eq!(ret.sale_id.as_deref(), Some("sale-1"));
    }
}
