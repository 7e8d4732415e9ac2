//! # kasir-db: Database Layer for Kasir
//!
//! SQLite storage for the checkout engine, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kasir Data Flow                                │
//! │                                                                         │
//! │  kasir-engine (checkout, status, inventory)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     kasir-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐   │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │   │    │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │   │    │
//! │  │   │               │    │ CatalogRepo    │    │              │   │    │
//! │  │   │ SqlitePool    │◄───│ TransactionRepo│    │ 001_initial  │   │    │
//! │  │   │ begin()       │    │ StockRepo      │    │   _schema    │   │    │
//! │  │   │               │    │ OutboxRepo     │    │              │   │    │
//! │  │   │               │    │ ActivityRepo   │    │              │   │    │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘   │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys on)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and units of work
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kasir_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("kasir.db")).await?;
//! let item = db.catalog().get_item("kopi-susu").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::activity::ActivityRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::outbox::OutboxRepository;
pub use repository::stock::{
    LowStockEntry, MovementFilter, MovementSummary, StockChange, StockRepository,
};
pub use repository::transaction::{
    generate_transaction_number, TransactionFilter, TransactionRepository, MAX_LIST_LIMIT,
};
