//! # kasir-engine: Checkout & Inventory Engine
//!
//! The operations a POS front end calls. Each one is a single unit of work
//! over the [`kasir_db::Database`] it is given; background effects go
//! through the outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kasir Engine                                   │
//! │                                                                         │
//! │  caller (TenantContext + request)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   kasir-engine (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐                │    │
//! │  │   │  checkout  │  │   status   │  │ inventory  │                │    │
//! │  │   │ hold, held │  │  delete    │  │  reports   │                │    │
//! │  │   └─────┬──────┘  └─────┬──────┘  └─────┬──────┘                │    │
//! │  │         └───────────────┼───────────────┘                       │    │
//! │  │                         ▼                                       │    │
//! │  │              kasir-core (pricing, totals, rules)                │    │
//! │  │              kasir-db   (one DB transaction each)               │    │
//! │  │                         │                                       │    │
//! │  │                         ▼ outbox_events                         │    │
//! │  │   ┌──────────────────────────────────────────┐                  │    │
//! │  │   │ OutboxWorker ── AccountingHook           │                  │    │
//! │  │   │              └─ ActivitySink             │                  │    │
//! │  │   └──────────────────────────────────────────┘                  │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - The [`Engine`] handle
//! - [`checkout`] - Checkout, hold, held orders
//! - [`status`] - Status transitions and deletes
//! - [`inventory`] - Manual stock movements and reports
//! - [`worker`] - Outbox delivery
//! - [`hooks`] - Accounting and activity collaborators
//! - [`config`] - Engine configuration
//! - [`context`] - Caller identity
//! - [`error`] - Engine errors and wire codes

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod inventory;
pub mod status;
pub mod worker;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutReceipt, CheckoutRequest, HoldRequest, SkippedDeduction};
pub use config::EngineConfig;
pub use context::{ActorRole, TenantContext};
pub use engine::Engine;
pub use error::{EngineError, EngineResult, ErrorCode};
pub use hooks::{
    AccountingHook, ActivitySink, DbActivitySink, ExpenseJournal, HookError, LoggingAccountingHook,
    TransactionJournal,
};
pub use inventory::StockMovementRequest;
pub use kasir_db::{MovementFilter, TransactionFilter};
pub use worker::{BatchReport, OutboxWorker, OutboxWorkerHandle};

/// Installs the global tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=kasir=trace` - Trace for kasir crates only
/// - Default: `info,kasir=debug,sqlx=warn`
///
/// Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,kasir=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
