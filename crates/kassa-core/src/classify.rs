//! # Error Classification
//!
//! Decides whether a fiscal-device failure is worth retrying.
//!
//! ## Why Classification Matters
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "network timeout"            → retriable  → backoff, try again         │
//! │  "Təkrar satış: already exists" → NON-retriable → terminal immediately  │
//! │                                                                         │
//! │  Retrying a duplicate-submission rejection would fiscalize the same     │
//! │  sale twice — a compliance violation, not a transient fault.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Error vocabularies differ per fiscal vendor (and per language — the
//! device text is partly Azerbaijani), so classification is a pluggable
//! trait behind a provider-keyed registry, never hardcoded into the
//! state machine.

use std::collections::HashMap;
use std::sync::Arc;

// =============================================================================
// Severity
// =============================================================================

/// Outcome of classifying a failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Transient device/network failure: bounded retry with backoff.
    Retriable,
    /// Duplicate/already-processed rejection: terminal immediately,
    /// regardless of remaining retry budget.
    NonRetriable,
}

impl ErrorSeverity {
    /// Convenience for storing on the job record.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorSeverity::Retriable)
    }
}

// =============================================================================
// Classifier Trait
// =============================================================================

/// Per-vendor failure-message classifier.
pub trait ErrorClassifier: Send + Sync {
    /// Classifies a raw device/bridge error message.
    fn classify(&self, message: &str) -> ErrorSeverity;
}

// =============================================================================
// Pattern Classifier
// =============================================================================

/// Messages matching any of these substrings (case-insensitive) mark a
/// failure as a duplicate/already-processed rejection. The Azerbaijani
/// entries match the device vocabulary observed in production.
const DEFAULT_NON_RETRIABLE_PATTERNS: &[&str] = &[
    "duplicate sale",
    "already printed",
    "already exists",
    "already processed",
    "təkrar satış",
    "artıq mövcud",
];

/// Substring-matching classifier.
///
/// Everything is retriable by default; only known duplicate patterns
/// are terminal. Unknown failures get the retry budget — a false
/// "retriable" costs three harmless attempts, a false "non-retriable"
/// silently drops a legally required fiscalization.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    /// Lowercased non-retriable substrings.
    patterns: Vec<String>,
}

impl PatternClassifier {
    /// Creates a classifier from a vendor-specific pattern list.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PatternClassifier {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        PatternClassifier::new(DEFAULT_NON_RETRIABLE_PATTERNS.iter().copied())
    }
}

impl ErrorClassifier for PatternClassifier {
    fn classify(&self, message: &str) -> ErrorSeverity {
        let message = message.to_lowercase();
        if self.patterns.iter().any(|p| message.contains(p.as_str())) {
            ErrorSeverity::NonRetriable
        } else {
            ErrorSeverity::Retriable
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Provider-keyed classifier lookup with a default fallback.
///
/// The engine owns one registry; the job-failure path asks it with the
/// failing job's provider. Registering a vendor twice replaces the
/// earlier classifier.
#[derive(Clone)]
pub struct ClassifierRegistry {
    vendors: HashMap<String, Arc<dyn ErrorClassifier>>,
    fallback: Arc<dyn ErrorClassifier>,
}

impl ClassifierRegistry {
    /// Creates a registry with the default pattern classifier as
    /// fallback.
    pub fn new() -> Self {
        ClassifierRegistry {
            vendors: HashMap::new(),
            fallback: Arc::new(PatternClassifier::default()),
        }
    }

    /// Registers a vendor-specific classifier.
    pub fn register(
        &mut self,
        provider: impl Into<String>,
        classifier: Arc<dyn ErrorClassifier>,
    ) {
        self.vendors.insert(provider.into(), classifier);
    }

    /// Classifies a message using the provider's classifier, or the
    /// fallback when the provider is unknown.
    pub fn classify(&self, provider: &str, message: &str) -> ErrorSeverity {
        self.vendors
            .get(provider)
            .unwrap_or(&self.fallback)
            .classify(message)
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        ClassifierRegistry::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_failures_are_retriable() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify("network timeout"),
            ErrorSeverity::Retriable
        );
        assert_eq!(
            classifier.classify("device not responding"),
            ErrorSeverity::Retriable
        );
    }

    #[test]
    fn test_duplicate_patterns_are_terminal() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify("Duplicate sale detected"),
            ErrorSeverity::NonRetriable
        );
        assert_eq!(
            classifier.classify("receipt ALREADY PRINTED"),
            ErrorSeverity::NonRetriable
        );
    }

    #[test]
    fn test_azerbaijani_vocabulary() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify("Təkrar satış: already exists"),
            ErrorSeverity::NonRetriable
        );
        assert_eq!(
            classifier.classify("Sənəd artıq mövcud"),
            ErrorSeverity::NonRetriable
        );
    }

    #[test]
    fn test_registry_vendor_override() {
        let mut registry = ClassifierRegistry::new();
        registry.register(
            "omnitech",
            Arc::new(PatternClassifier::new(["code 0x51"])),
        );

        // Vendor classifier knows its own vocabulary
        assert_eq!(
            registry.classify("omnitech", "rejected: code 0x51"),
            ErrorSeverity::NonRetriable
        );
        // ...and replaces the default list entirely
        assert_eq!(
            registry.classify("omnitech", "duplicate sale"),
            ErrorSeverity::Retriable
        );
        // Unknown vendors fall back to the defaults
        assert_eq!(
            registry.classify("unknown", "duplicate sale"),
            ErrorSeverity::NonRetriable
        );
    }
}
