//! # Outbox Repository
//!
//! Durable queue of background effects (journal entries, activity records)
//! that must not roll back a committed sale.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  CHECKOUT / STATUS CHANGE / STOCK MOVEMENT                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   SINGLE UNIT OF WORK                           │    │
//! │  │                                                                 │    │
//! │  │  1. INSERT / UPDATE the business rows                           │    │
//! │  │  2. INSERT INTO outbox_events (kind, aggregate_id, payload)     │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← both land or neither does                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │            OUTBOX WORKER (async)                                │    │
//! │  │                                                                 │    │
//! │  │  1. get_pending(batch, max_attempts)                            │    │
//! │  │  2. For each event: dispatch to the hook                        │    │
//! │  │     a. ok    → mark_delivered()                                 │    │
//! │  │     b. error → mark_failed() (attempts += 1, last_error)        │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  Events at max_attempts stay in the table as dead letters.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kasir_core::{OutboxEvent, OutboxKind};

const OUTBOX_COLUMNS: &str = "id, tenant_id, kind, aggregate_id, payload, attempts, \
     last_error, created_at, attempted_at, delivered_at";

/// Repository for outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Queues an event inside the caller's unit of work.
    ///
    /// ## Example
    /// ```rust,ignore
    /// db.outbox()
    ///     .enqueue(&mut tx, tenant_id, OutboxKind::JournalTransaction, &trx.id, &trx)
    ///     .await?;
    /// ```
    pub async fn enqueue<T: Serialize + ?Sized>(
        &self,
        conn: &mut SqliteConnection,
        tenant_id: &str,
        kind: OutboxKind,
        aggregate_id: &str,
        payload: &T,
    ) -> DbResult<OutboxEvent> {
        let event = OutboxEvent {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            kind,
            aggregate_id: aggregate_id.to_string(),
            payload: serde_json::to_string(payload)?,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            delivered_at: None,
        };

        debug!(kind = %kind, aggregate_id = %aggregate_id, "Queuing outbox event");

        sqlx::query(
            r#"
            INSERT INTO outbox_events (
                id, tenant_id, kind, aggregate_id, payload,
                attempts, last_error, created_at, attempted_at, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&event.id)
        .bind(&event.tenant_id)
        .bind(event.kind)
        .bind(&event.aggregate_id)
        .bind(&event.payload)
        .bind(event.attempts)
        .bind(&event.last_error)
        .bind(event.created_at)
        .bind(event.attempted_at)
        .bind(event.delivered_at)
        .execute(conn)
        .await?;

        Ok(event)
    }

    /// Undelivered events still under the retry ceiling, oldest first.
    pub async fn get_pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<OutboxEvent>> {
        let events = sqlx::query_as::<_, OutboxEvent>(&format!(
            r#"
            SELECT {OUTBOX_COLUMNS}
            FROM outbox_events
            WHERE delivered_at IS NULL AND attempts < ?2
            ORDER BY rowid ASC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Events of one aggregate in insertion order, delivered or not.
    pub async fn events_for(&self, aggregate_id: &str) -> DbResult<Vec<OutboxEvent>> {
        let events = sqlx::query_as::<_, OutboxEvent>(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox_events WHERE aggregate_id = ?1 ORDER BY rowid"
        ))
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Marks an event as delivered.
    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE outbox_events SET
                delivered_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a failed delivery attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts undelivered events still eligible for retry.
    pub async fn count_pending(&self, max_attempts: u32) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox_events WHERE delivered_at IS NULL AND attempts < ?1",
        )
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Counts events that gave up after `max_attempts`.
    pub async fn count_dead(&self, max_attempts: u32) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox_events WHERE delivered_at IS NULL AND attempts >= ?1",
        )
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes delivered events older than `days_old` days.
    ///
    /// ## Returns
    /// Number of deleted events.
    pub async fn cleanup_delivered(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));

        let result = sqlx::query(
            "DELETE FROM outbox_events WHERE delivered_at IS NOT NULL AND delivered_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
