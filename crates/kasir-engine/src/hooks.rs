//! # Collaborator Hooks
//!
//! Background effects of a sale that live outside this engine: the
//! accounting journal and the activity log.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Hook Delivery                                     │
//! │                                                                         │
//! │  checkout / status change / stock movement                              │
//! │       │  (same unit of work)                                            │
//! │       ▼                                                                 │
//! │  outbox_events ── OutboxWorker ──┬── AccountingHook                     │
//! │                                  │     journal_for_transaction()        │
//! │                                  │     journal_for_expense()            │
//! │                                  │                                      │
//! │                                  └── ActivitySink                       │
//! │                                        record()                         │
//! │                                                                         │
//! │  A hook error only bumps the event's attempt counter.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use kasir_core::{ActivityEntry, Payment, StockMovement, Transaction};
use kasir_db::{ActivityRepository, DbError};

/// A hook could not handle an event. The worker records the message and
/// retries later.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl From<DbError> for HookError {
    fn from(err: DbError) -> Self {
        HookError(err.to_string())
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// `journal.transaction` payload: a completed sale and how it was paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionJournal {
    pub transaction: Transaction,
    pub payments: Vec<Payment>,
}

/// `journal.expense` payload: stock bought at a cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseJournal {
    pub movement: StockMovement,
    pub resource_name: String,
}

// =============================================================================
// Traits
// =============================================================================

/// Receives journal entries for sales and stock purchases.
#[async_trait]
pub trait AccountingHook: Send + Sync {
    async fn journal_for_transaction(
        &self,
        tenant_id: &str,
        journal: &TransactionJournal,
    ) -> Result<(), HookError>;

    async fn journal_for_expense(
        &self,
        tenant_id: &str,
        journal: &ExpenseJournal,
    ) -> Result<(), HookError>;
}

/// Receives audit entries.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), HookError>;
}

// =============================================================================
// Defaults
// =============================================================================

/// Accounting hook for deployments without a ledger integration: logs the
/// entry and acknowledges it.
#[derive(Debug, Clone, Default)]
pub struct LoggingAccountingHook;

#[async_trait]
impl AccountingHook for LoggingAccountingHook {
    async fn journal_for_transaction(
        &self,
        tenant_id: &str,
        journal: &TransactionJournal,
    ) -> Result<(), HookError> {
        info!(
            tenant_id = %tenant_id,
            transaction_number = %journal.transaction.transaction_number,
            total = %journal.transaction.total,
            payments = journal.payments.len(),
            "Journal entry for transaction"
        );
        Ok(())
    }

    async fn journal_for_expense(
        &self,
        tenant_id: &str,
        journal: &ExpenseJournal,
    ) -> Result<(), HookError> {
        info!(
            tenant_id = %tenant_id,
            resource = %journal.resource_name,
            total_cost = %journal.movement.total_cost,
            "Journal entry for stock expense"
        );
        Ok(())
    }
}

/// Writes audit entries into the `activity_logs` table.
#[derive(Debug, Clone)]
pub struct DbActivitySink {
    repo: ActivityRepository,
}

impl DbActivitySink {
    pub fn new(repo: ActivityRepository) -> Self {
        DbActivitySink { repo }
    }
}

#[async_trait]
impl ActivitySink for DbActivitySink {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), HookError> {
        self.repo.insert(entry).await?;
        Ok(())
    }
}
