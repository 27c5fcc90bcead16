//! # Tenant Fiscal Config Repository
//!
//! Per-tenant mirror of the device's shift state. The upsert is
//! last-writer-wins: the device is authoritative, every reconcile
//! overwrites the mirror wholesale.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use kassa_core::types::TenantFiscalConfig;

/// Repository for tenant fiscal configuration.
#[derive(Debug, Clone)]
pub struct FiscalConfigRepository {
    pool: SqlitePool,
}

impl FiscalConfigRepository {
    /// Creates a new FiscalConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FiscalConfigRepository { pool }
    }

    /// Gets the fiscal configuration for a tenant.
    pub async fn get(&self, tenant_id: &str) -> DbResult<Option<TenantFiscalConfig>> {
        let config = sqlx::query_as::<_, TenantFiscalConfig>(
            r#"
            SELECT tenant_id, provider, shift_open, shift_opened_at,
                   last_z_report_at, tz_offset_minutes, updated_at
            FROM tenant_fiscal_config
            WHERE tenant_id = ?1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(config)
    }

    /// Upserts the full configuration row for a tenant.
    pub async fn upsert(&self, config: &TenantFiscalConfig) -> DbResult<()> {
        debug!(
            tenant_id = %config.tenant_id,
            shift_open = config.shift_open,
            "Upserting fiscal config"
        );

        sqlx::query(
            r#"
            INSERT INTO tenant_fiscal_config (
                tenant_id, provider, shift_open, shift_opened_at,
                last_z_report_at, tz_offset_minutes, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(tenant_id) DO UPDATE SET
                provider = excluded.provider,
                shift_open = excluded.shift_open,
                shift_opened_at = excluded.shift_opened_at,
                last_z_report_at = excluded.last_z_report_at,
                tz_offset_minutes = excluded.tz_offset_minutes,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&config.tenant_id)
        .bind(&config.provider)
        .bind(config.shift_open)
        .bind(config.shift_opened_at)
        .bind(config.last_z_report_at)
        .bind(config.tz_offset_minutes)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
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

    #[tokio::test]
    async fn test_upsert_is_last_writer_wins() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fiscal_config();

        assert!(repo.get("t-1").await.unwrap().is_none());

        let now = Utc::now();
        let mut config = TenantFiscalConfig {
            tenant_id: "t-1".into(),
            provider: "omnitech".into(),
            shift_open: true,
            shift_opened_at: Some(now),
            last_z_report_at: None,
            tz_offset_minutes: 240,
            updated_at: now,
        };
        repo.upsert(&config).await.unwrap();

        let fetched = repo.get("t-1").await.unwrap().unwrap();
        assert!(fetched.shift_open);
        assert_eq!(fetched.tz_offset_minutes, 240);

        config.shift_open = false;
        config.shift_opened_at = None;
        config.last_z_report_at = Some(now);
        repo.upsert(&config).await.unwrap();

        let fetched = repo.get("t-1").await.unwrap().unwrap();
        assert!(!fetched.shift_open);
        assert!(fetched.shift_opened_at.is_none());
        assert!(fetched.last_z_report_at.is_some());
    }
}
