//! # kassa-db: Database Layer for the Fiscal Back-Office Core
//!
//! SQLite persistence for fiscal jobs, the credit ledger, stored-value
//! cards, and reference sequences.
//!
//! ## Repository Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           kassa-db                                      │
//! │                                                                         │
//! │   Database (pool.rs)                                                    │
//! │     ├── jobs()          FiscalJobRepository     - queue + pickup        │
//! │     ├── documents()     FiscalDocumentRepository- number writeback      │
//! │     ├── credits()       CreditEntryRepository   - ledger mutations      │
//! │     ├── receipts()      GoodsReceiptRepository  - derived status        │
//! │     ├── expenses()      ExpenseRepository       - cascade source        │
//! │     ├── cards()         StoredValueCardRepository                       │
//! │     ├── fiscal_config() FiscalConfigRepository  - shift mirror          │
//! │     └── sequences()     SequenceRepository      - atomic counters       │
//! │                                                                         │
//! │   Methods suffixed `_tx` take `&mut SqliteConnection` and compose       │
//! │   into the engine's multi-repository transactions.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::card::StoredValueCardRepository;
pub use repository::config::FiscalConfigRepository;
pub use repository::credit::{CreditEntryRepository, NewCreditEntry};
pub use repository::document::{FiscalDocumentRepository, ReturnDoc, SaleDoc};
pub use repository::expense::{ExpenseRepository, NewExpense};
pub use repository::job::{FiscalJobRepository, NewFiscalJob};
pub use repository::receipt::GoodsReceiptRepository;
pub use repository::sequence::SequenceRepository;
