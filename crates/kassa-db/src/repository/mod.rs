//! Repository implementations, one per aggregate.
//!
//! Pool-level methods (`&self`) are single-statement operations.
//! Methods suffixed `_tx` take `&mut SqliteConnection` so the engine
//! can compose several repositories into one atomic transaction — a
//! ledger mutation and its receipt propagation, or the expense-delete
//! cascade, must commit or roll back together.

pub mod card;
pub mod config;
pub mod credit;
pub mod document;
pub mod expense;
pub mod job;
pub mod receipt;
pub mod sequence;
