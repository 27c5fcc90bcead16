//! # Shift Synchronizer
//!
//! Keeps the per-tenant shift mirror aligned with the fiscal device.
//!
//! ## Device Is Authoritative
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  shift_open job completes  ──► apply_shift_open   (open, stamp time)    │
//! │  shift_close job completes ──► apply_shift_close  (close, Z-report at)  │
//! │  shift_status job completes ──► reconcile(payload)                      │
//! │       device says open/closed ──► mirror overwritten, last-writer-wins  │
//! │                                                                         │
//! │  The local row is a cache of the device's opinion. On any divergence    │
//! │  the device wins; nobody "merges".                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::EngineResult;
use kassa_core::shift::{parse_shift_report, ShiftReport};
use kassa_core::types::TenantFiscalConfig;
use kassa_db::Database;

/// Baku business timezone, used until a tenant configures its own.
pub const DEFAULT_TZ_OFFSET_MINUTES: i64 = 240;

/// Shift-state reconciliation service.
#[derive(Clone)]
pub struct ShiftSynchronizer {
    db: Database,
}

impl ShiftSynchronizer {
    /// Creates a new ShiftSynchronizer.
    pub fn new(db: Database) -> Self {
        ShiftSynchronizer { db }
    }

    /// The tenant's current mirror, or a closed-shift default.
    pub async fn current(
        &self,
        tenant_id: &str,
        provider: &str,
    ) -> EngineResult<TenantFiscalConfig> {
        Ok(self
            .db
            .fiscal_config()
            .get(tenant_id)
            .await?
            .unwrap_or_else(|| default_config(tenant_id, provider)))
    }

    /// Marks the shift open after a shift_open job completes.
    pub async fn apply_shift_open(
        &self,
        tenant_id: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<TenantFiscalConfig> {
        let mut config = self.current(tenant_id, provider).await?;
        config.shift_open = true;
        config.shift_opened_at = Some(now);
        config.updated_at = now;
        self.db.fiscal_config().upsert(&config).await?;

        info!(tenant_id, "Shift opened");
        Ok(config)
    }

    /// Marks the shift closed after a shift_close (Z-report) completes.
    pub async fn apply_shift_close(
        &self,
        tenant_id: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<TenantFiscalConfig> {
        let mut config = self.current(tenant_id, provider).await?;
        config.shift_open = false;
        config.shift_opened_at = None;
        config.last_z_report_at = Some(now);
        config.updated_at = now;
        self.db.fiscal_config().upsert(&config).await?;

        info!(tenant_id, "Shift closed");
        Ok(config)
    }

    /// Overwrites the mirror with the device's own shift report.
    ///
    /// Called with the response payload of a completed shift_status
    /// job. Wall-clock tokens in the payload are interpreted in the
    /// tenant's configured timezone.
    pub async fn reconcile(
        &self,
        tenant_id: &str,
        provider: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<TenantFiscalConfig> {
        let mut config = self.current(tenant_id, provider).await?;
        let report: ShiftReport = parse_shift_report(payload, config.tz_offset_minutes)?;

        config.shift_open = report.shift_open;
        config.shift_opened_at = report.opened_at;
        if !report.shift_open {
            // Device closed the shift behind our back; the close time is
            // unknown, only the fact of it
            config.shift_opened_at = None;
        }
        config.updated_at = now;
        self.db.fiscal_config().upsert(&config).await?;

        info!(
            tenant_id,
            shift_open = config.shift_open,
            "Shift mirror reconciled from device report"
        );
        Ok(config)
    }
}

fn default_config(tenant_id: &str, provider: &str) -> TenantFiscalConfig {
    TenantFiscalConfig {
        tenant_id: tenant_id.to_string(),
        provider: provider.to_string(),
        shift_open: false,
        shift_opened_at: None,
        last_z_report_at: None,
        tz_offset_minutes: DEFAULT_TZ_OFFSET_MINUTES,
        updated_at: Utc::now(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
