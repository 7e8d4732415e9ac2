//! # Outbox Worker
//!
//! Delivers queued `outbox_events` to the accounting hook and the activity
//! sink.
//!
//! ## Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Worker Flow                                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    outbox_events Table                          │    │
//! │  │                                                                 │    │
//! │  │  id | kind                | aggregate | attempts | delivered_at │    │
//! │  │  ───┼─────────────────────┼───────────┼──────────┼────────────  │    │
//! │  │  1  │ journal.transaction │ trx-001   │ 0        │ NULL         │    │
//! │  │  2  │ activity            │ trx-001   │ 0        │ NULL         │    │
//! │  │  3  │ journal.expense     │ mov-001   │ 3        │ NULL         │    │
//! │  └────────────────────────────┬────────────────────────────────────┘    │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    OutboxWorker                                 │    │
//! │  │                                                                 │    │
//! │  │  wake up: interval tick OR nudge from a commit                  │    │
//! │  │  1. get_pending(batch_size, max_attempts)                       │    │
//! │  │  2. dispatch by kind                                            │    │
//! │  │       journal.transaction → AccountingHook                      │    │
//! │  │       journal.expense     → AccountingHook                      │    │
//! │  │       activity            → ActivitySink                        │    │
//! │  │  3. ok → mark_delivered   error → mark_failed (attempts += 1)   │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  TIMING:                                                                │
//! │  • Poll interval: 5 seconds (configurable)                              │
//! │  • Batch size: 100 events (configurable)                                │
//! │  • Max attempts: 10 (then logged and left as a dead letter)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use kasir_core::{ActivityEntry, OutboxEvent, OutboxKind};
use kasir_db::Database;

use crate::config::OutboxSettings;
use crate::error::{EngineError, EngineResult};
use crate::hooks::{AccountingHook, ActivitySink, ExpenseJournal, HookError, TransactionJournal};

// =============================================================================
// Handle
// =============================================================================

/// Handle for controlling the outbox worker.
#[derive(Clone)]
pub struct OutboxWorkerHandle {
    /// Shutdown sender.
    shutdown_tx: mpsc::Sender<()>,

    /// Wake-up sender. Capacity 1: one pending nudge is enough.
    nudge_tx: mpsc::Sender<()>,
}

impl OutboxWorkerHandle {
    /// Asks the worker to run a batch now. Never blocks.
    pub fn nudge(&self) {
        // Full means a wake-up is already queued.
        let _ = self.nudge_tx.try_send(());
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| EngineError::Config("Outbox worker already stopped".into()))
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub delivered: usize,
    pub failed: usize,
}

// =============================================================================
// Worker
// =============================================================================

pub struct OutboxWorker {
    db: Database,
    settings: OutboxSettings,
    accounting: Arc<dyn AccountingHook>,
    activity: Arc<dyn ActivitySink>,
    nudge_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl OutboxWorker {
    /// Creates a new worker and returns a handle.
    pub fn new(
        db: Database,
        settings: OutboxSettings,
        accounting: Arc<dyn AccountingHook>,
        activity: Arc<dyn ActivitySink>,
    ) -> (Self, OutboxWorkerHandle) {
        let (nudge_tx, nudge_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = OutboxWorker {
            db,
            settings,
            accounting,
            activity,
            nudge_rx,
            shutdown_rx,
        };

        (worker, OutboxWorkerHandle { shutdown_tx, nudge_tx })
    }

    /// Runs the worker loop until shutdown, or until every handle is
    /// dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Outbox worker starting");

        let mut interval = tokio::time::interval(self.settings.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Poll on interval
                _ = interval.tick() => {
                    if let Err(e) = self.process_batch().await {
                        error!(?e, "Failed to process outbox batch");
                    }
                }

                // A commit just queued events
                Some(()) = self.nudge_rx.recv() => {
                    if let Err(e) = self.process_batch().await {
                        error!(?e, "Failed to process outbox batch");
                    }
                }

                // Shutdown
                _ = self.shutdown_rx.recv() => {
                    info!("Outbox worker shutting down");
                    break;
                }
            }
        }

        info!("Outbox worker stopped");
    }

    /// Delivers one batch of pending events.
    pub async fn process_batch(&self) -> EngineResult<BatchReport> {
        let outbox = self.db.outbox();
        let events = outbox
            .get_pending(self.settings.batch_size, self.settings.max_attempts)
            .await?;

        if events.is_empty() {
            debug!("No pending outbox events");
            return Ok(BatchReport::default());
        }

        debug!(count = events.len(), "Processing outbox batch");

        let mut report = BatchReport::default();
        for event in &events {
            match self.dispatch(event).await {
                Ok(()) => {
                    outbox.mark_delivered(&event.id).await?;
                    report.delivered += 1;
                }
                Err(e) => {
                    outbox.mark_failed(&event.id, &e.to_string()).await?;
                    report.failed += 1;

                    let attempts = event.attempts + 1;
                    if attempts >= i64::from(self.settings.max_attempts) {
                        error!(
                            id = %event.id,
                            kind = %event.kind,
                            aggregate_id = %event.aggregate_id,
                            attempts,
                            error = %e,
                            "Giving up on outbox event"
                        );
                    } else {
                        warn!(
                            id = %event.id,
                            kind = %event.kind,
                            attempts,
                            error = %e,
                            "Outbox delivery failed, will retry"
                        );
                    }
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            "Outbox batch processed"
        );
        Ok(report)
    }

    async fn dispatch(&self, event: &OutboxEvent) -> Result<(), HookError> {
        let malformed = |e: serde_json::Error| HookError(format!("Malformed payload: {e}"));

        match event.kind {
            OutboxKind::JournalTransaction => {
                let journal: TransactionJournal =
                    serde_json::from_str(&event.payload).map_err(malformed)?;
                self.accounting
                    .journal_for_transaction(&event.tenant_id, &journal)
                    .await
            }
            OutboxKind::JournalExpense => {
                let journal: ExpenseJournal =
                    serde_json::from_str(&event.payload).map_err(malformed)?;
                self.accounting
                    .journal_for_expense(&event.tenant_id, &journal)
                    .await
            }
            OutboxKind::Activity => {
                let entry: ActivityEntry = serde_json::from_str(&event.payload).map_err(malformed)?;
                self.activity.record(&entry).await
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
