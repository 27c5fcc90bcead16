//! # Validation Helpers
//!
//! Early input validation, run before business logic. Kept small: the
//! real invariants (overpayment, transitions) live with their modules.

use crate::error::ValidationError;
use crate::money::Money;

/// Rejects empty or whitespace-only identifiers.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required { field })
    } else {
        Ok(())
    }
}

/// Rejects zero or negative amounts.
pub fn require_positive(field: &'static str, amount: Money) -> Result<(), ValidationError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(ValidationError::MustBePositive { field })
    }
}

/// Reference-number prefixes are short uppercase ASCII ("SC", "EXP").
/// Date-scoped sequences may use an empty prefix.
pub fn validate_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.len() > 8 {
        return Err(ValidationError::InvalidFormat {
            field: "prefix",
            reason: "longer than 8 characters".into(),
        });
    }
    if !prefix.chars().all(|c| c.is_ascii_uppercase() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "prefix",
            reason: "must be uppercase ASCII".into(),
        });
    }
    Ok(())
}
