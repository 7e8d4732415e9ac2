//! # Stock Repository
//!
//! Stock levels of items and ingredients, and the movement ledger.
//!
//! ## Conditional Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two terminals sell the last Es Teh at the same moment:                 │
//! │                                                                         │
//! │  A: UPDATE items SET stock = stock - 1                                  │
//! │       WHERE id = 'teh' AND stock >= 1 RETURNING stock   → 1 row (0)     │
//! │                                                                         │
//! │  B: UPDATE items SET stock = stock - 1                                  │
//! │       WHERE id = 'teh' AND stock >= 1 RETURNING stock   → 0 rows        │
//! │       └── caller maps "no row" to InsufficientStock and rolls back      │
//! │                                                                         │
//! │  The check and the write are ONE statement, so there is no window       │
//! │  between reading stock and writing it.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method that changes stock takes the caller's connection so the
//! matching ledger row lands in the same unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::transaction::MAX_LIST_LIMIT;
use kasir_core::{Money, MovementType, Quantity, ResourceKind, StockMovement};

const MOVEMENT_COLUMNS: &str = "id, resource_kind, resource_id, movement_type, quantity, \
     unit_price, total_cost, stock_before, stock_after, outlet_id, user_id, reference_id, \
     notes, created_at";

/// Stock level before and after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub before: Quantity,
    pub after: Quantity,
}

/// A trackable resource at or below its minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LowStockEntry {
    pub resource_kind: ResourceKind,
    pub resource_id: String,
    pub name: String,
    pub stock: Quantity,
    pub min_stock: Quantity,
}

/// Ledger totals for one movement type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MovementSummary {
    pub movement_type: MovementType,
    pub count: i64,
    pub total_quantity: Quantity,
    pub total_cost: Money,
}

/// Filters for [`StockRepository::list_movements`]. Unset fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementFilter {
    pub outlet_id: Option<String>,
    pub movement_type: Option<MovementType>,
    pub resource_kind: Option<ResourceKind>,
    pub resource_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Defaults to 100, capped at [`MAX_LIST_LIMIT`].
    pub limit: Option<u32>,
}

impl MovementFilter {
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(100).clamp(1, MAX_LIST_LIMIT))
    }
}

fn table(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Item => "items",
        ResourceKind::Ingredient => "ingredients",
    }
}

/// Repository for stock levels and the ledger.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    // =========================================================================
    // Stock Writes
    // =========================================================================

    /// Subtracts `qty` only if the resource has at least that much.
    ///
    /// Returns `None` when the resource is missing or short; nothing is
    /// written in that case.
    pub async fn deduct(
        &self,
        conn: &mut SqliteConnection,
        kind: ResourceKind,
        id: &str,
        qty: Quantity,
    ) -> DbResult<Option<StockChange>> {
        let sql = format!(
            "UPDATE {} SET stock = stock - ?2, updated_at = ?3 \
             WHERE id = ?1 AND stock >= ?2 RETURNING stock",
            table(kind)
        );

        let after: Option<Quantity> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(qty)
            .bind(Utc::now())
            .fetch_optional(conn)
            .await?;

        debug!(kind = %kind, id = %id, qty = %qty, applied = after.is_some(), "Conditional deduct");

        Ok(after.map(|after| StockChange {
            before: after + qty,
            after,
        }))
    }

    /// Adds `qty` (restock, restoration). `None` if the resource is missing.
    pub async fn add(
        &self,
        conn: &mut SqliteConnection,
        kind: ResourceKind,
        id: &str,
        qty: Quantity,
    ) -> DbResult<Option<StockChange>> {
        let sql = format!(
            "UPDATE {} SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1 RETURNING stock",
            table(kind)
        );

        let after: Option<Quantity> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(qty)
            .bind(Utc::now())
            .fetch_optional(conn)
            .await?;

        Ok(after.map(|after| StockChange {
            before: after - qty,
            after,
        }))
    }

    /// Locks the resource row for this unit of work and returns its stock.
    ///
    /// Implemented as a write (touching `updated_at`) so SQLite hands the
    /// write lock to this transaction before the caller reads anything.
    pub async fn lock_stock(
        &self,
        conn: &mut SqliteConnection,
        kind: ResourceKind,
        id: &str,
    ) -> DbResult<Option<Quantity>> {
        let sql = format!(
            "UPDATE {} SET updated_at = ?2 WHERE id = ?1 RETURNING stock",
            table(kind)
        );

        let stock: Option<Quantity> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(conn)
            .await?;

        Ok(stock)
    }

    /// Overwrites stock. Only call after [`Self::lock_stock`] in the same
    /// unit of work.
    pub async fn set_stock(
        &self,
        conn: &mut SqliteConnection,
        kind: ResourceKind,
        id: &str,
        stock: Quantity,
    ) -> DbResult<bool> {
        let sql = format!(
            "UPDATE {} SET stock = ?2, updated_at = ?3 WHERE id = ?1",
            table(kind)
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(stock)
            .bind(Utc::now())
            .execute(conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Current stock, read over the pool.
    pub async fn current_stock(&self, kind: ResourceKind, id: &str) -> DbResult<Option<Quantity>> {
        let sql = format!("SELECT stock FROM {} WHERE id = ?1", table(kind));
        let stock: Option<Quantity> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(stock)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Appends a ledger row.
    pub async fn insert_movement(
        &self,
        conn: &mut SqliteConnection,
        movement: &StockMovement,
    ) -> DbResult<()> {
        debug!(
            kind = %movement.resource_kind,
            resource_id = %movement.resource_id,
            movement_type = %movement.movement_type,
            before = %movement.stock_before,
            after = %movement.stock_after,
            "Recording stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, resource_kind, resource_id, movement_type,
                quantity, unit_price, total_cost,
                stock_before, stock_after,
                outlet_id, user_id, reference_id, notes, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9,
                ?10, ?11, ?12, ?13, ?14
            )
            "#,
        )
        .bind(&movement.id)
        .bind(movement.resource_kind)
        .bind(&movement.resource_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.unit_price)
        .bind(movement.total_cost)
        .bind(movement.stock_before)
        .bind(movement.stock_after)
        .bind(&movement.outlet_id)
        .bind(&movement.user_id)
        .bind(&movement.reference_id)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn get_movement(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<StockMovement>> {
        let movement = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(movement)
    }

    pub async fn delete_movement(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM stock_movements WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Ledger rows of one type that reference a transaction.
    pub async fn movements_for_reference(
        &self,
        conn: &mut SqliteConnection,
        reference_id: &str,
        kind: ResourceKind,
        movement_type: MovementType,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE reference_id = ?1 AND resource_kind = ?2 AND movement_type = ?3 \
             ORDER BY rowid"
        ))
        .bind(reference_id)
        .bind(kind)
        .bind(movement_type)
        .fetch_all(conn)
        .await?;

        Ok(movements)
    }

    /// Full history of one resource, oldest first.
    pub async fn movements_for_resource(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE resource_kind = ?1 AND resource_id = ?2 ORDER BY rowid"
        ))
        .bind(kind)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// A tenant's ledger rows matching `filter`, newest first.
    pub async fn list_movements(
        &self,
        tenant_id: &str,
        filter: &MovementFilter,
    ) -> DbResult<Vec<StockMovement>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE outlet_id IN (SELECT id FROM outlets WHERE tenant_id = "
        ));
        qb.push_bind(tenant_id);
        qb.push(")");

        if let Some(outlet_id) = &filter.outlet_id {
            qb.push(" AND outlet_id = ").push_bind(outlet_id);
        }
        if let Some(movement_type) = filter.movement_type {
            qb.push(" AND movement_type = ").push_bind(movement_type);
        }
        if let Some(kind) = filter.resource_kind {
            qb.push(" AND resource_kind = ").push_bind(kind);
        }
        if let Some(resource_id) = &filter.resource_id {
            qb.push(" AND resource_id = ").push_bind(resource_id);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.limit());

        let movements = qb
            .build_query_as::<StockMovement>()
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Every ledger row that references a transaction, oldest first.
    pub async fn movements_for_transaction(&self, reference_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE reference_id = ?1 ORDER BY rowid"
        ))
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    pub async fn count_movements(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Trackable items and all ingredients at or below their minimum.
    pub async fn low_stock(&self, outlet_id: &str) -> DbResult<Vec<LowStockEntry>> {
        let entries = sqlx::query_as::<_, LowStockEntry>(
            r#"
            SELECT 'item' AS resource_kind, id AS resource_id, name, stock, min_stock
            FROM items
            WHERE outlet_id = ?1 AND track_stock = 1 AND is_active = 1 AND stock <= min_stock
            UNION ALL
            SELECT 'ingredient' AS resource_kind, id AS resource_id, name, stock, min_stock
            FROM ingredients
            WHERE outlet_id = ?1 AND stock <= min_stock
            ORDER BY resource_kind, name
            "#,
        )
        .bind(outlet_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Count, quantity and cost per movement type for an outlet.
    pub async fn movement_summary(&self, outlet_id: &str) -> DbResult<Vec<MovementSummary>> {
        let summary = sqlx::query_as::<_, MovementSummary>(
            r#"
            SELECT
                movement_type,
                COUNT(*) AS count,
                COALESCE(SUM(quantity), 0) AS total_quantity,
                COALESCE(SUM(total_cost), 0) AS total_cost
            FROM stock_movements
            WHERE outlet_id = ?1
            GROUP BY movement_type
            ORDER BY movement_type
            "#,
        )
        .bind(outlet_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
