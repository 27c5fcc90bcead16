//! # Reference Sequence Repository
//!
//! Atomic per-(tenant, prefix, scope) counters for reference numbers.
//!
//! Allocation is a single upsert-increment statement:
//!
//! ```sql
//! INSERT ... ON CONFLICT ... DO UPDATE SET next_value = next_value + 1
//! RETURNING next_value
//! ```
//!
//! SQLite serializes writers, so two concurrent allocations for the
//! same counter row always see distinct values — no read-modify-write
//! window, no duplicates, though crashes may leave gaps (an allocated
//! value whose entity insert never committed is simply skipped).

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository for reference number sequences.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Allocates the next value inside an open transaction.
    ///
    /// Used when the allocated number must commit together with the
    /// entity that consumes it (credit entries, expenses).
    pub async fn next_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        prefix: &str,
        scope_key: &str,
    ) -> DbResult<i64> {
        let (value,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO reference_sequences (tenant_id, prefix, scope_key, next_value)
            VALUES (?1, ?2, ?3, 1)
            ON CONFLICT(tenant_id, prefix, scope_key)
            DO UPDATE SET next_value = next_value + 1
            RETURNING next_value
            "#,
        )
        .bind(tenant_id)
        .bind(prefix)
        .bind(scope_key)
        .fetch_one(&mut *conn)
        .await?;

        debug!(tenant_id, prefix, scope_key, value, "Allocated sequence value");
        Ok(value)
    }

    /// Allocates the next value in its own transaction.
    pub async fn next(&self, tenant_id: &str, prefix: &str, scope_key: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::next_tx(&mut conn, tenant_id, prefix, scope_key).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
