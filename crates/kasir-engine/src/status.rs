//! # Status Transitions
//!
//! Moves transactions through their lifecycle and runs the compensation a
//! move requires.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Status Change Unit of Work                          │
//! │                                                                         │
//! │  reason check ── before any read                                        │
//! │       │                                                                 │
//! │  ownership + plan_transition ── X → X returns as is                     │
//! │       │                                                                 │
//! │  BEGIN                                                                  │
//! │   ├── UPDATE ... WHERE status = <from>   (0 rows: someone else won)     │
//! │   ├── completed → cancelled: reverse sale rows (ingredients if enabled) │
//! │   └── activity outbox event                                             │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional update runs first, so two cancels of the same sale can
//! never both reach the restoration step.

use chrono::Utc;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use kasir_core::status::{append_status_note, check_reason, plan_transition, TransitionPlan};
use kasir_core::validation::validate_reason;
use kasir_core::{
    CoreError, Money, MovementType, OutboxKind, Quantity, ResourceKind, StockMovement,
    Transaction, TransactionStatus,
};
use kasir_db::DbError;

use crate::context::TenantContext;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

impl Engine {
    /// Changes a transaction's status.
    ///
    /// Returns the transaction as stored after the change. Asking for the
    /// status it already has is a no-op that returns it unchanged.
    pub async fn transition_status(
        &self,
        ctx: &TenantContext,
        id: &str,
        to: TransactionStatus,
        reason: Option<&str>,
    ) -> EngineResult<Transaction> {
        let reason = check_reason(to, reason)?;
        let current = self.owned_transaction(ctx, id).await?;

        let (from, restore_stock, stamp_completed) = match plan_transition(current.status, to)? {
            TransitionPlan::NoOp => return Ok(current),
            TransitionPlan::Apply {
                from,
                restore_stock,
                stamp_completed,
                ..
            } => (from, restore_stock, stamp_completed),
        };

        let now = Utc::now();
        let notes = match &reason {
            Some(reason) => Some(append_status_note(current.notes.as_deref(), now, to, reason)),
            None => current.notes.clone(),
        };
        let completed_at = stamp_completed.then_some(now);

        let trx_repo = self.db.transactions();
        let mut tx = self.db.begin().await?;

        let applied = trx_repo
            .update_status(&mut tx, id, from, to, notes.as_deref(), completed_at)
            .await?;

        if !applied {
            let latest = trx_repo
                .lock(&mut tx, id)
                .await?
                .ok_or_else(|| EngineError::not_found("Transaction", id))?;
            if latest.status == to {
                return Ok(latest);
            }
            return Err(CoreError::InvalidTransition {
                from: latest.status,
                to,
            }
            .into());
        }

        let note = format!("Restored: {} {}", to, current.transaction_number);
        let restored = if restore_stock {
            self.restore_sale(&mut tx, ctx, &current, &note).await?
        } else {
            0
        };

        let mut activity = ctx.activity("UPDATE_TRANSACTION_STATUS", "transaction", id);
        activity.outlet_id = Some(current.outlet_id.clone());
        activity.old_value = Some(json!({ "status": from }));
        activity.new_value = Some(json!({ "status": to }));
        activity.reason = reason.clone();
        self.db
            .outbox()
            .enqueue(&mut tx, &ctx.tenant_id, OutboxKind::Activity, id, &activity)
            .await?;

        let updated = trx_repo
            .lock(&mut tx, id)
            .await?
            .ok_or_else(|| EngineError::not_found("Transaction", id))?;

        tx.commit().await.map_err(DbError::from)?;
        self.nudge_outbox();

        info!(
            transaction_number = %current.transaction_number,
            from = %from,
            to = %to,
            restored = restored,
            "Transaction status changed"
        );

        Ok(updated)
    }

    /// Deletes a transaction. Owners and managers only.
    ///
    /// A completed sale gets its stock back first. Ledger rows stay.
    pub async fn delete_transaction(
        &self,
        ctx: &TenantContext,
        id: &str,
        reason: Option<&str>,
    ) -> EngineResult<()> {
        if !ctx.role.is_privileged() {
            return Err(EngineError::access_denied(
                "only owners and managers may delete transactions",
            ));
        }
        let reason = validate_reason(reason)?;
        self.owned_transaction(ctx, id).await?;

        let trx_repo = self.db.transactions();
        let mut tx = self.db.begin().await?;

        // Status may have moved since the read above
        let locked = trx_repo
            .lock(&mut tx, id)
            .await?
            .ok_or_else(|| EngineError::not_found("Transaction", id))?;

        let restored = if locked.status == TransactionStatus::Completed {
            let note = format!("Restored: deleted {}", locked.transaction_number);
            self.restore_sale(&mut tx, ctx, &locked, &note).await?
        } else {
            0
        };

        trx_repo.delete(&mut tx, id).await?;

        let mut activity = ctx.activity("DELETE_TRANSACTION", "transaction", id);
        activity.outlet_id = Some(locked.outlet_id.clone());
        activity.old_value = Some(json!({
            "transaction_number": locked.transaction_number,
            "status": locked.status,
            "total": locked.total,
        }));
        activity.reason = Some(reason);
        self.db
            .outbox()
            .enqueue(&mut tx, &ctx.tenant_id, OutboxKind::Activity, id, &activity)
            .await?;

        tx.commit().await.map_err(DbError::from)?;
        self.nudge_outbox();

        info!(
            transaction_number = %locked.transaction_number,
            restored = restored,
            "Transaction deleted"
        );
        Ok(())
    }

    /// Gives back what a sale took by reversing its `sale` ledger rows,
    /// one `IN` row each.
    ///
    /// Items come back as recorded at checkout, whatever their tracking
    /// flag says now. Ingredients are only given back when
    /// `inventory.restore_ingredients_on_cancel` is set.
    async fn restore_sale(
        &self,
        conn: &mut SqliteConnection,
        ctx: &TenantContext,
        trx: &Transaction,
        note: &str,
    ) -> EngineResult<usize> {
        let mut kinds = vec![ResourceKind::Item];
        if self.config.inventory.restore_ingredients_on_cancel {
            kinds.push(ResourceKind::Ingredient);
        }

        let stock = self.db.stock();
        let mut restored = 0;

        for kind in kinds {
            let sales = stock
                .movements_for_reference(conn, &trx.id, kind, MovementType::Sale)
                .await?;
            for sale in sales {
                let taken = -sale.delta();
                match stock.add(conn, kind, &sale.resource_id, taken).await? {
                    Some(change) => {
                        let movement = restore_movement(
                            ctx,
                            trx,
                            kind,
                            &sale.resource_id,
                            taken,
                            sale.unit_price,
                            change.before,
                            change.after,
                            note,
                        );
                        stock.insert_movement(conn, &movement).await?;
                        restored += 1;
                    }
                    None => warn!(
                        kind = %kind,
                        resource_id = %sale.resource_id,
                        "Sold resource no longer exists, nothing to restore"
                    ),
                }
            }
        }

        Ok(restored)
    }
}

#[allow(clippy::too_many_arguments)]
fn restore_movement(
    ctx: &TenantContext,
    trx: &Transaction,
    kind: ResourceKind,
    resource_id: &str,
    quantity: Quantity,
    unit_price: Money,
    stock_before: Quantity,
    stock_after: Quantity,
    note: &str,
) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4().to_string(),
        resource_kind: kind,
        resource_id: resource_id.to_string(),
        movement_type: MovementType::In,
        quantity,
        unit_price,
        total_cost: unit_price.multiply_stock(quantity),
        stock_before,
        stock_after,
        outlet_id: trx.outlet_id.clone(),
        user_id: ctx.user_id.clone(),
        reference_id: Some(trx.id.clone()),
        notes: Some(note.to_string()),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CheckoutRequest, HoldRequest};
    use crate::config::EngineConfig;
    use crate::context::ActorRole;
    use crate::error::ErrorCode;
    use crate::test_support::{cash, fixture, fixture_with, Fixture};
    use kasir_core::{CartLine, OrderType};

    async fn sell(f: &Fixture, item_id: &str, qty: i64, pay_major: i64) -> Transaction {
        let request = CheckoutRequest::new("o1", OrderType::DineIn)
            .with_line(CartLine::new(item_id, qty))
            .with_payment(cash(pay_major));
        f.engine
            .checkout(&f.cashier, request)
            .await
            .unwrap()
            .detail
            .transaction
    }

    #[tokio::test]
    async fn test_cancel_restores_sold_stock_once() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 3, 75_000).await;
        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(7));

        let cancelled = f
            .engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Cancelled, Some("salah input"))
            .await
            .unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(10));

        let notes = cancelled.notes.unwrap();
        assert!(notes.ends_with("cancelled: salah input"), "{notes}");

        let ledger = f.db.stock().movements_for_transaction(&trx.id).await.unwrap();
        let types: Vec<MovementType> = ledger.iter().map(|m| m.movement_type).collect();
        assert_eq!(types, vec![MovementType::Sale, MovementType::In]);
        assert_eq!(ledger[1].delta(), Quantity::from_units(3));

        // Repeating the cancel is a no-op
        let again = f
            .engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Cancelled, Some("lagi"))
            .await
            .unwrap();
        assert_eq!(again.status, TransactionStatus::Cancelled);
        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(10));
        assert_eq!(f.count("stock_movements").await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_cancels_restore_once() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 2, 50_000).await;

        let (a, b) = tokio::join!(
            f.engine
                .transition_status(&f.manager, &trx.id, TransactionStatus::Cancelled, Some("a")),
            f.engine
                .transition_status(&f.manager, &trx.id, TransactionStatus::Cancelled, Some("b"))
        );

        assert_eq!(a.unwrap().status, TransactionStatus::Cancelled);
        assert_eq!(b.unwrap().status, TransactionStatus::Cancelled);
        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(10));
    }

    #[tokio::test]
    async fn test_reason_checked_before_anything_else() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 1, 25_000).await;

        let err = f
            .engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Void, Some("  "))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReasonRequired);

        // Unknown ids still fail on the reason first
        let err = f
            .engine
            .transition_status(&f.manager, "missing", TransactionStatus::Refund, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReasonRequired);

        let stored = f.engine.transaction(&f.cashier, &trx.id).await.unwrap();
        assert_eq!(stored.transaction.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_void_does_not_restore() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 2, 50_000).await;

        f.engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Void, Some("dobel"))
            .await
            .unwrap();

        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(8));
    }

    #[tokio::test]
    async fn test_cancel_follows_ledger_not_current_tracking_flag() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        f.untracked_item("es", 5_000).await;

        let request = CheckoutRequest::new("o1", OrderType::DineIn)
            .with_line(CartLine::new("nasi", 2))
            .with_line(CartLine::new("es", 1))
            .with_payment(cash(55_000));
        let trx = f
            .engine
            .checkout(&f.cashier, request)
            .await
            .unwrap()
            .detail
            .transaction;

        for (id, track) in [("nasi", false), ("es", true)] {
            sqlx::query("UPDATE items SET track_stock = ? WHERE id = ?")
                .bind(track)
                .bind(id)
                .execute(f.db.pool())
                .await
                .unwrap();
        }

        f.engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Cancelled, Some("batal"))
            .await
            .unwrap();

        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(10));
        assert_eq!(f.item_stock("es").await, Quantity::zero());
    }

    #[tokio::test]
    async fn test_terminal_status_has_no_exit() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 1, 25_000).await;

        f.engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Refund, Some("komplain"))
            .await
            .unwrap();

        let err = f
            .engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition {
                from: TransactionStatus::Refund,
                to: TransactionStatus::Completed
            })
        ));
    }

    #[tokio::test]
    async fn test_held_order_completion_stamps_completed_at() {
        let f = fixture().await;
        let held = f
            .engine
            .hold(
                &f.cashier,
                HoldRequest {
                    outlet_id: "o1".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let completed = f
            .engine
            .transition_status(&f.cashier, &held.id, TransactionStatus::Completed, None)
            .await
            .unwrap();

        assert_eq!(completed.status, TransactionStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.notes, held.notes);
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_change_status() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 1, 25_000).await;

        let outsider = TenantContext::new("t2", "owner-2", ActorRole::Owner);
        let err = f
            .engine
            .transition_status(&outsider, &trx.id, TransactionStatus::Cancelled, Some("x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);
        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(9));
    }

    #[tokio::test]
    async fn test_ingredients_stay_consumed_by_default() {
        let f = fixture().await;
        f.untracked_item("nasi", 25_000).await;
        f.ingredient("beras", Quantity::from_units(1_000), 20).await;
        f.recipe("nasi", "beras", Quantity::from_units(50)).await;
        let trx = sell(&f, "nasi", 2, 50_000).await;

        f.engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Cancelled, Some("batal"))
            .await
            .unwrap();

        assert_eq!(
            f.stock(ResourceKind::Ingredient, "beras").await,
            Quantity::from_units(900)
        );
    }

    #[tokio::test]
    async fn test_ingredients_restored_when_enabled() {
        let mut config = EngineConfig::default();
        config.inventory.restore_ingredients_on_cancel = true;
        let f = fixture_with(config).await;
        f.untracked_item("nasi", 25_000).await;
        f.ingredient("beras", Quantity::from_units(1_000), 20).await;
        f.recipe("nasi", "beras", Quantity::from_units(50)).await;
        let trx = sell(&f, "nasi", 2, 50_000).await;

        f.engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Cancelled, Some("batal"))
            .await
            .unwrap();

        assert_eq!(
            f.stock(ResourceKind::Ingredient, "beras").await,
            Quantity::from_units(1_000)
        );
        let ledger = f.db.stock().movements_for_transaction(&trx.id).await.unwrap();
        let restore = ledger.iter().find(|m| m.movement_type == MovementType::In).unwrap();
        assert_eq!(restore.delta(), Quantity::from_units(100));
        assert_eq!(restore.total_cost, Money::from_major(2_000));
    }

    #[tokio::test]
    async fn test_delete_requires_privilege_and_reason() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 1, 25_000).await;

        let err = f
            .engine
            .delete_transaction(&f.cashier, &trx.id, Some("salah"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);

        let err = f
            .engine
            .delete_transaction(&f.manager, &trx.id, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        assert_eq!(f.count("transactions").await, 1);
    }

    #[tokio::test]
    async fn test_delete_completed_restores_and_keeps_ledger() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 4, 100_000).await;

        f.engine
            .delete_transaction(&f.manager, &trx.id, Some("transaksi uji"))
            .await
            .unwrap();

        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(10));
        assert_eq!(f.count("transactions").await, 0);
        assert_eq!(f.count("transaction_items").await, 0);
        assert_eq!(f.count("payments").await, 0);

        let ledger = f.db.stock().movements_for_transaction(&trx.id).await.unwrap();
        assert_eq!(ledger.len(), 2);

        let err = f.engine.transaction(&f.manager, &trx.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_delete_cancelled_does_not_restore_again() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;
        let trx = sell(&f, "nasi", 2, 50_000).await;

        f.engine
            .transition_status(&f.manager, &trx.id, TransactionStatus::Cancelled, Some("batal"))
            .await
            .unwrap();
        f.engine
            .delete_transaction(&f.manager, &trx.id, Some("bersih-bersih"))
            .await
            .unwrap();

        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(10));
    }
}
