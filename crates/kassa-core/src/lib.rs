//! # kassa-core: Pure Business Logic for the Fiscal Back-Office Core
//!
//! This crate is the **heart** of Kassa. It contains the fiscal job state
//! machine, the credit-ledger arithmetic, and every invariant the system
//! must uphold, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kassa Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              External Collaborators (not in this repo)          │   │
//! │  │    POS flow ──► business events      Bridge ──► device protocol │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kassa-engine (Services)                      │   │
//! │  │   FiscalJobQueue, LedgerEngine, ExpenseService, ShiftSync...    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kassa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │    job    │  │  ledger   │  │ classify  │   │   │
//! │  │   │ FiscalJob │  │ guards +  │  │ payments  │  │ retriable │   │   │
//! │  │   │ CreditEnt │  │ backoff   │  │ reversals │  │  or not   │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │  refnum   │  │   shift   │  │   card    │                  │   │
//! │  │   │ formatting│  │  parsing  │  │ lifecycle │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kassa-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (FiscalJob, CreditEntry, GoodsReceipt, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`job`] - Fiscal job state-machine guards and retry backoff
//! - [`classify`] - Pluggable per-vendor error classification
//! - [`ledger`] - Credit entry payment/reversal arithmetic
//! - [`refnum`] - Reference-number scopes and formatting
//! - [`shift`] - Device shift-report parsing
//! - [`card`] - Stored-value card state machine
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation helpers
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic; time is always
//!    passed in, never read from a clock
//! 2. **No I/O**: database, network, and device access are FORBIDDEN here
//! 3. **Integer Money**: all monetary values are in qəpik (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod card;
pub mod classify;
pub mod error;
pub mod job;
pub mod ledger;
pub mod money;
pub mod refnum;
pub mod shift;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use card::CardError;
pub use classify::{ClassifierRegistry, ErrorClassifier, ErrorSeverity, PatternClassifier};
pub use error::{CoreError, CoreResult, ValidationError};
pub use job::{MAX_RETRIES, BACKOFF_BASE_SECS};
pub use ledger::PaymentError;
pub use money::Money;
pub use shift::ShiftReport;
pub use types::*;
