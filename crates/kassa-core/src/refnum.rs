//! # Reference Number Formatting
//!
//! Scopes and rendering for tenant-scoped human-readable sequence
//! numbers ("SC-2025-000123", "20260824-0001").
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  • No duplicate is ever issued per (tenant, prefix, scope)              │
//! │  • Gaps are acceptable (a rolled-back transaction may skip a number)    │
//! │  • Rendered strings are opaque to callers: display only, never parsed   │
//! │    back for business meaning                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module only formats. Allocation (the atomic counter increment)
//! lives in `kassa-db`'s sequence repository — a plain "SELECT max then
//! INSERT" is a race and is deliberately not offered here.

use chrono::NaiveDate;

// =============================================================================
// Scope
// =============================================================================

/// The window within which a sequence restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One endless sequence per (tenant, prefix).
    None,
    /// Restarts each year (credit/receipt numbers: "SC-2025-000123").
    Year(i32),
    /// Restarts each day (sale numbers: "20260824-0001").
    Date(NaiveDate),
}

impl Scope {
    /// The counter-row key for this scope. Different keys never block
    /// each other.
    pub fn key(&self) -> String {
        match self {
            Scope::None => String::new(),
            Scope::Year(year) => year.to_string(),
            Scope::Date(date) => date.format("%Y%m%d").to_string(),
        }
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Default zero-padding width for year-scoped sequences.
pub const DEFAULT_SEQ_WIDTH: usize = 6;

/// Renders a reference number from an allocated sequence value.
///
/// ## Formats
/// - `Scope::None`: `PREFIX000123`
/// - `Scope::Year`: `PREFIX-2025-000123`
/// - `Scope::Date`: `PREFIX20260824-0123` (date token embedded)
pub fn format_reference(prefix: &str, scope: Scope, seq: i64, width: usize) -> String {
    match scope {
        Scope::None => format!("{prefix}{seq:0width$}"),
        Scope::Year(year) => format!("{prefix}-{year}-{seq:0width$}"),
        Scope::Date(date) => {
            format!("{prefix}{}-{seq:0width$}", date.format("%Y%m%d"))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_scoped_format() {
        assert_eq!(
            format_reference("SC", Scope::Year(2025), 123, DEFAULT_SEQ_WIDTH),
            "SC-2025-000123"
        );
    }

    #[test]
    fn test_unscoped_format() {
        assert_eq!(format_reference("EXP", Scope::None, 7, 6), "EXP000007");
    }

    #[test]
    fn test_date_scoped_format() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        assert_eq!(
            format_reference("", Scope::Date(date), 1, 4),
            "20260824-0001"
        );
    }

    #[test]
    fn test_scope_keys_distinct() {
        let d1 = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();

        assert_eq!(Scope::None.key(), "");
        assert_eq!(Scope::Year(2025).key(), "2025");
        assert_ne!(Scope::Date(d1).key(), Scope::Date(d2).key());
    }
}
