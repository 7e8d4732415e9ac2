//! # Transaction Repository
//!
//! Database operations for transaction headers, lines, modifiers and
//! payments.
//!
//! ## Transaction Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Transaction Lifecycle                             │
//! │                                                                         │
//! │  1. CHECKOUT (one unit of work)                                         │
//! │     └── insert_transaction()  status = completed                        │
//! │     └── insert_item() + insert_modifier() per line                      │
//! │     └── insert_payment() per payment                                    │
//! │     └── (stock deductions + outbox rows in the same unit of work)       │
//! │                                                                         │
//! │  1b. HOLD                                                               │
//! │     └── insert_transaction()  status = pending, number HOLD-...         │
//! │                                                                         │
//! │  2. STATUS CHANGE                                                       │
//! │     └── update_status(from → to) WHERE status = from                    │
//! │                                                                         │
//! │  3. DELETE                                                              │
//! │     └── delete() → lines, modifiers, payments cascade                   │
//! │         ledger rows are kept                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kasir_core::{
    Payment, Transaction, TransactionDetail, TransactionItem, TransactionLine,
    TransactionModifier, TransactionStatus,
};

const TRANSACTION_COLUMNS: &str = "id, transaction_number, order_type, status, outlet_id, \
     cashier_id, table_id, customer_name, customer_phone, subtotal, discount, tax, \
     service_charge, total, notes, created_at, updated_at, completed_at";

const ITEM_COLUMNS: &str =
    "id, transaction_id, item_id, variant_id, item_name, unit_price, quantity, subtotal, notes";

/// Largest page a listing returns.
pub const MAX_LIST_LIMIT: u32 = 500;

/// Filters for [`TransactionRepository::list`]. Unset fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionFilter {
    pub outlet_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub cashier_id: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    /// Defaults to 50, capped at [`MAX_LIST_LIMIT`].
    pub limit: Option<u32>,
}

impl TransactionFilter {
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(50).clamp(1, MAX_LIST_LIMIT))
    }
}

/// Repository for transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    // =========================================================================
    // Writes (caller's unit of work)
    // =========================================================================

    /// Inserts a transaction header.
    ///
    /// A duplicate `transaction_number` surfaces as `DbError::UniqueViolation`.
    pub async fn insert_transaction(
        &self,
        conn: &mut SqliteConnection,
        trx: &Transaction,
    ) -> DbResult<()> {
        debug!(
            id = %trx.id,
            transaction_number = %trx.transaction_number,
            status = %trx.status,
            "Inserting transaction"
        );

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, transaction_number, order_type, status,
                outlet_id, cashier_id, table_id, customer_name, customer_phone,
                subtotal, discount, tax, service_charge, total,
                notes, created_at, updated_at, completed_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18
            )
            "#,
        )
        .bind(&trx.id)
        .bind(&trx.transaction_number)
        .bind(trx.order_type)
        .bind(trx.status)
        .bind(&trx.outlet_id)
        .bind(&trx.cashier_id)
        .bind(&trx.table_id)
        .bind(&trx.customer_name)
        .bind(&trx.customer_phone)
        .bind(trx.subtotal)
        .bind(trx.discount)
        .bind(trx.tax)
        .bind(trx.service_charge)
        .bind(trx.total)
        .bind(&trx.notes)
        .bind(trx.created_at)
        .bind(trx.updated_at)
        .bind(trx.completed_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Adds a line to a transaction.
    ///
    /// ## Snapshot Pattern
    /// Item name and resolved price are copied onto the line so history
    /// survives later menu edits.
    pub async fn insert_item(
        &self,
        conn: &mut SqliteConnection,
        item: &TransactionItem,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transaction_items (
                id, transaction_id, item_id, variant_id, item_name,
                unit_price, quantity, subtotal, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.transaction_id)
        .bind(&item.item_id)
        .bind(&item.variant_id)
        .bind(&item.item_name)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.subtotal)
        .bind(&item.notes)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn insert_modifier(
        &self,
        conn: &mut SqliteConnection,
        modifier: &TransactionModifier,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transaction_modifiers (
                id, transaction_item_id, modifier_id, modifier_name, price
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&modifier.id)
        .bind(&modifier.transaction_item_id)
        .bind(&modifier.modifier_id)
        .bind(&modifier.modifier_name)
        .bind(modifier.price)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Records a payment for a transaction.
    pub async fn insert_payment(&self, conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        debug!(transaction_id = %payment.transaction_id, amount = %payment.amount, "Recording payment");

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, transaction_id, method, amount, change_amount,
                reference_number, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.transaction_id)
        .bind(&payment.method)
        .bind(payment.amount)
        .bind(payment.change_amount)
        .bind(&payment.reference_number)
        .bind(payment.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Moves a transaction from `from` to `to` only if it is still in `from`.
    ///
    /// Returns `false` when another writer got there first (or the row is
    /// gone). `completed_at` is only overwritten when `Some`.
    pub async fn update_status(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        notes: Option<&str>,
        completed_at: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                status = ?3,
                notes = ?4,
                completed_at = COALESCE(?5, completed_at),
                updated_at = ?6
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(notes)
        .bind(completed_at)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deletes a transaction header; lines, modifiers and payments cascade.
    pub async fn delete(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Touches the header so the unit of work holds the write lock, and
    /// returns the row as it is now.
    pub async fn lock(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Transaction>> {
        let trx = sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions SET updated_at = updated_at WHERE id = ?1 RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(trx)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a transaction header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let trx = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(trx)
    }

    /// Lines of a transaction in insertion order, read inside a unit of work.
    pub async fn items_for(
        &self,
        conn: &mut SqliteConnection,
        transaction_id: &str,
    ) -> DbResult<Vec<TransactionItem>> {
        let items = sqlx::query_as::<_, TransactionItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM transaction_items WHERE transaction_id = ?1 ORDER BY rowid"
        ))
        .bind(transaction_id)
        .fetch_all(conn)
        .await?;

        Ok(items)
    }

    /// Loads the full aggregate: header, lines with modifiers, payments.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<TransactionDetail>> {
        let mut conn = self.pool.acquire().await?;

        let transaction = match sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        {
            Some(t) => t,
            None => return Ok(None),
        };

        let items = self.items_for(&mut conn, id).await?;

        let modifiers = sqlx::query_as::<_, TransactionModifier>(
            r#"
            SELECT m.id, m.transaction_item_id, m.modifier_id, m.modifier_name, m.price
            FROM transaction_modifiers m
            JOIN transaction_items i ON i.id = m.transaction_item_id
            WHERE i.transaction_id = ?1
            ORDER BY m.rowid
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, transaction_id, method, amount, change_amount, reference_number, created_at
            FROM payments
            WHERE transaction_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let lines = items
            .into_iter()
            .map(|item| {
                let modifiers = modifiers
                    .iter()
                    .filter(|m| m.transaction_item_id == item.id)
                    .cloned()
                    .collect();
                TransactionLine { item, modifiers }
            })
            .collect();

        Ok(Some(TransactionDetail {
            transaction,
            lines,
            payments,
        }))
    }

    /// Pending (held) orders of a tenant, newest first.
    pub async fn list_pending_for_tenant(&self, tenant_id: &str) -> DbResult<Vec<Transaction>> {
        let trx = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT t.id, t.transaction_number, t.order_type, t.status, t.outlet_id,
                   t.cashier_id, t.table_id, t.customer_name, t.customer_phone,
                   t.subtotal, t.discount, t.tax, t.service_charge, t.total,
                   t.notes, t.created_at, t.updated_at, t.completed_at
            FROM transactions t
            JOIN outlets o ON o.id = t.outlet_id
            WHERE o.tenant_id = ?1 AND t.status = 'pending'
            ORDER BY t.created_at DESC, t.rowid DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(trx)
    }

    /// A tenant's transactions matching `filter`, newest first.
    pub async fn list(&self, tenant_id: &str, filter: &TransactionFilter) -> DbResult<Vec<Transaction>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE outlet_id IN (SELECT id FROM outlets WHERE tenant_id = "
        ));
        qb.push_bind(tenant_id);
        qb.push(")");

        if let Some(outlet_id) = &filter.outlet_id {
            qb.push(" AND outlet_id = ").push_bind(outlet_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(cashier_id) = &filter.cashier_id {
            qb.push(" AND cashier_id = ").push_bind(cashier_id);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.limit());

        let trx = qb.build_query_as::<Transaction>().fetch_all(&self.pool).await?;
        debug!(tenant_id = %tenant_id, count = trx.len(), "Listed transactions");
        Ok(trx)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Generates a transaction number: `<PREFIX>-YYYYMMDDHHMMSS-XXXXXX`.
///
/// The suffix is the first six hex digits of a v4 UUID. The UNIQUE index on
/// `transaction_number` catches the (unlikely) collision.
///
/// ## Example
/// `TRX-20240501103000-9f3a1c`
pub fn generate_transaction_number(prefix: &str) -> String {
    let now = Utc::now();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("{}-{}-{}", prefix, now.format("%Y%m%d%H%M%S"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use kasir_core::{Money, OrderType, Outlet};

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
            .insert_outlet(&Outlet {
                id: "o1".to_string(),
                tenant_id: "t1".to_string(),
                name: "Pusat".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        db
    }

    fn header(id: &str, number: &str, status: TransactionStatus) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: id.to_string(),
            transaction_number: number.to_string(),
            order_type: OrderType::Takeaway,
            status,
            outlet_id: "o1".to_string(),
            cashier_id: "u1".to_string(),
            table_id: None,
            customer_name: Some("Budi".to_string()),
            customer_phone: None,
            subtotal: Money::from_major(20_000),
            discount: Money::zero(),
            tax: Money::zero(),
            service_charge: Money::zero(),
            total: Money::from_major(20_000),
            notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn test_transaction_number_format() {
        let number = generate_transaction_number("TRX");
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TRX");
        assert_eq!(parts[1].len(), 14);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_insert_and_load_detail() {
        let db = setup().await;
        let repo = db.transactions();

        let mut tx = db.begin().await.unwrap();
        repo.insert_transaction(&mut tx, &header("t1", "TRX-1", TransactionStatus::Completed))
            .await
            .unwrap();
        repo.insert_item(
            &mut tx,
            &TransactionItem {
                id: "l1".to_string(),
                transaction_id: "t1".to_string(),
                item_id: "kopi".to_string(),
                variant_id: None,
                item_name: "Kopi".to_string(),
                unit_price: Money::from_major(10_000),
                quantity: 2,
                subtotal: Money::from_major(20_000),
                notes: None,
            },
        )
        .await
        .unwrap();
        repo.insert_modifier(
            &mut tx,
            &TransactionModifier {
                id: "m1".to_string(),
                transaction_item_id: "l1".to_string(),
                modifier_id: "oat".to_string(),
                modifier_name: "Oat Milk".to_string(),
                price: Money::zero(),
            },
        )
        .await
        .unwrap();
        repo.insert_payment(
            &mut tx,
            &Payment {
                id: "p1".to_string(),
                transaction_id: "t1".to_string(),
                method: "cash".to_string(),
                amount: Money::from_major(20_000),
                change_amount: Money::zero(),
                reference_number: None,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let detail = repo.get_detail("t1").await.unwrap().unwrap();
        assert_eq!(detail.transaction.status, TransactionStatus::Completed);
        assert_eq!(detail.transaction.order_type, OrderType::Takeaway);
        assert_eq!(detail.lines.len(), 1);
        assert_eq!(detail.lines[0].modifiers.len(), 1);
        assert_eq!(detail.payments[0].amount, Money::from_major(20_000));

        assert!(repo.get_detail("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_number_is_unique_violation() {
        let db = setup().await;
        let repo = db.transactions();

        let mut tx = db.begin().await.unwrap();
        repo.insert_transaction(&mut tx, &header("t1", "TRX-1", TransactionStatus::Completed))
            .await
            .unwrap();
        let err = repo
            .insert_transaction(&mut tx, &header("t2", "TRX-1", TransactionStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_status_is_conditional() {
        let db = setup().await;
        let repo = db.transactions();

        let mut tx = db.begin().await.unwrap();
        repo.insert_transaction(&mut tx, &header("t1", "TRX-1", TransactionStatus::Completed))
            .await
            .unwrap();

        let applied = repo
            .update_status(
                &mut tx,
                "t1",
                TransactionStatus::Completed,
                TransactionStatus::Cancelled,
                Some("note"),
                None,
            )
            .await
            .unwrap();
        assert!(applied);

        let again = repo
            .update_status(
                &mut tx,
                "t1",
                TransactionStatus::Completed,
                TransactionStatus::Cancelled,
                Some("note"),
                None,
            )
            .await
            .unwrap();
        assert!(!again);
        tx.commit().await.unwrap();

        let trx = repo.get_by_id("t1").await.unwrap().unwrap();
        assert_eq!(trx.status, TransactionStatus::Cancelled);
        assert_eq!(trx.notes.as_deref(), Some("note"));
    }

    #[tokio::test]
    async fn test_delete_cascades_children() {
        let db = setup().await;
        let repo = db.transactions();

        let mut tx = db.begin().await.unwrap();
        repo.insert_transaction(&mut tx, &header("t1", "TRX-1", TransactionStatus::Completed))
            .await
            .unwrap();
        repo.insert_payment(
            &mut tx,
            &Payment {
                id: "p1".to_string(),
                transaction_id: "t1".to_string(),
                method: "qris".to_string(),
                amount: Money::from_major(20_000),
                change_amount: Money::zero(),
                reference_number: Some("QR-1".to_string()),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        assert!(repo.delete(&mut tx, "t1").await.unwrap());
        tx.commit().await.unwrap();

        let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(payments, 0);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pending_listed_per_tenant() {
        let db = setup().await;
        let repo = db.transactions();

        let mut tx = db.begin().await.unwrap();
        repo.insert_transaction(&mut tx, &header("h1", "HOLD-1", TransactionStatus::Pending))
            .await
            .unwrap();
        repo.insert_transaction(&mut tx, &header("t1", "TRX-1", TransactionStatus::Completed))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let held = repo.list_pending_for_tenant("t1").await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].id, "h1");
        assert!(repo.list_pending_for_tenant("t2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_applies_filters() {
        let db = setup().await;
        let repo = db.transactions();
        let now = Utc::now();

        let mut old = header("t1", "TRX-1", TransactionStatus::Completed);
        old.created_at = now - chrono::Duration::days(3);
        let mut other_cashier = header("t2", "TRX-2", TransactionStatus::Completed);
        other_cashier.cashier_id = "u2".to_string();
        let cancelled = header("t3", "TRX-3", TransactionStatus::Cancelled);

        let mut tx = db.begin().await.unwrap();
        for trx in [&old, &other_cashier, &cancelled] {
            repo.insert_transaction(&mut tx, trx).await.unwrap();
        }
        tx.commit().await.unwrap();

        let ids = |rows: Vec<Transaction>| rows.into_iter().map(|t| t.id).collect::<Vec<_>>();

        let all = repo.list("t1", &TransactionFilter::default()).await.unwrap();
        assert_eq!(ids(all), vec!["t3", "t2", "t1"]);

        let completed = TransactionFilter {
            status: Some(TransactionStatus::Completed),
            ..Default::default()
        };
        assert_eq!(ids(repo.list("t1", &completed).await.unwrap()), vec!["t2", "t1"]);

        let mine_recent = TransactionFilter {
            cashier_id: Some("u1".to_string()),
            from: Some(now - chrono::Duration::days(1)),
            ..Default::default()
        };
        assert_eq!(ids(repo.list("t1", &mine_recent).await.unwrap()), vec!["t3"]);

        let first = TransactionFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(repo.list("t1", &first).await.unwrap().len(), 1);
        assert!(repo.list("t2", &TransactionFilter::default()).await.unwrap().is_empty());
    }
}
