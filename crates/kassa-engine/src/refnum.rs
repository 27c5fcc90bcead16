//! # Reference Number Service
//!
//! Hands out tenant-scoped human-readable numbers by combining the
//! atomic counter in kassa-db with the formatting in kassa-core.
//! Callers that need the number to commit together with the entity that
//! consumes it use the `_tx` variant.

use tracing::debug;

use crate::error::EngineResult;
use kassa_core::refnum::{format_reference, Scope, DEFAULT_SEQ_WIDTH};
use kassa_core::{validation, CoreError};
use kassa_db::repository::sequence::SequenceRepository;
use kassa_db::Database;

/// Reference number allocation service.
#[derive(Clone)]
pub struct ReferenceNumbers {
    db: Database,
}

impl ReferenceNumbers {
    /// Creates a new ReferenceNumbers service.
    pub fn new(db: Database) -> Self {
        ReferenceNumbers { db }
    }

    /// Allocates and renders the next number for (tenant, prefix, scope).
    pub async fn next(
        &self,
        tenant_id: &str,
        prefix: &str,
        scope: Scope,
    ) -> EngineResult<String> {
        validation::validate_prefix(prefix).map_err(CoreError::from)?;

        let seq = self
            .db
            .sequences()
            .next(tenant_id, prefix, &scope.key())
            .await?;
        let rendered = format_reference(prefix, scope, seq, width_for(scope));

        debug!(tenant_id, prefix, seq, rendered, "Reference number allocated");
        Ok(rendered)
    }

    /// Allocation inside an already-open transaction.
    pub async fn next_tx(
        tx: &mut sqlx::SqliteConnection,
        tenant_id: &str,
        prefix: &str,
        scope: Scope,
    ) -> EngineResult<String> {
        validation::validate_prefix(prefix).map_err(CoreError::from)?;

        let seq = SequenceRepository::next_tx(tx, tenant_id, prefix, &scope.key()).await?;
        Ok(format_reference(prefix, scope, seq, width_for(scope)))
    }
}

/// Daily sale numbers stay short ("20260824-0001"); year-scoped and
/// unscoped sequences get the full width.
fn width_for(scope: Scope) -> usize {
    match scope {
        Scope::Date(_) => 4,
        _ => DEFAULT_SEQ_WIDTH,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
