//! # Inventory
//!
//! Manual stock movements and stock reports.
//!
//! | Type     | Effect                       | Write                         |
//! |----------|------------------------------|-------------------------------|
//! | `IN`     | `stock + quantity`           | plain add                     |
//! | `OUT`    | `stock - quantity`           | conditional, never below zero |
//! | `ADJUST` | `stock = quantity` (a count) | locked read, then set         |
//!
//! Every write and its ledger row share one unit of work. `sale` rows only
//! come from checkout.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use kasir_core::validation::{validate_date_range, validate_reason};
use kasir_core::{
    CoreError, Money, MovementType, OutboxKind, Quantity, ResourceKind, StockMovement,
    StockShortfall, ValidationError,
};
use kasir_db::{DbError, LowStockEntry, MovementFilter, MovementSummary, StockChange};

use crate::context::TenantContext;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::hooks::ExpenseJournal;

/// A manual movement on an item or an ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovementRequest {
    pub outlet_id: String,
    pub resource_kind: ResourceKind,
    pub resource_id: String,
    /// `IN`, `OUT` or `ADJUST`.
    pub movement_type: MovementType,
    /// Amount moved, or the counted level for `ADJUST`.
    pub quantity: Quantity,
    /// Purchase price per unit; also updates an ingredient's cost on `IN`.
    #[serde(default)]
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Required for item `OUT` and `ADJUST`.
    #[serde(default)]
    pub reason: Option<String>,
}

/// What a manual movement needs to know about its resource.
struct Resource {
    name: String,
    cost_per_unit: Money,
}

impl Engine {
    /// Applies a manual movement and appends its ledger row.
    pub async fn record_stock_movement(
        &self,
        ctx: &TenantContext,
        request: StockMovementRequest,
    ) -> EngineResult<StockMovement> {
        let reason = validate_movement(&request)?;
        self.authorize_outlet(ctx, &request.outlet_id).await?;
        let resource = self
            .resource_in_outlet(request.resource_kind, &request.resource_id, &request.outlet_id)
            .await?;

        let stock = self.db.stock();
        let kind = request.resource_kind;
        let id = request.resource_id.as_str();
        let mut tx = self.db.begin().await?;

        let current = stock
            .lock_stock(&mut tx, kind, id)
            .await?
            .ok_or_else(|| EngineError::not_found(entity_name(kind), id))?;

        let change = match request.movement_type {
            MovementType::In => stock.add(&mut tx, kind, id, request.quantity).await?,
            MovementType::Out => stock.deduct(&mut tx, kind, id, request.quantity).await?,
            MovementType::Adjust => stock
                .set_stock(&mut tx, kind, id, request.quantity)
                .await?
                .then_some(StockChange {
                    before: current,
                    after: request.quantity,
                }),
            MovementType::Sale => None,
        };
        let change = change.ok_or_else(|| CoreError::InsufficientStock {
            shortfalls: vec![StockShortfall {
                resource_id: id.to_string(),
                name: resource.name.clone(),
                available: current,
                requested: request.quantity,
            }],
        })?;

        let moved = change.after - change.before;
        let quantity = if moved.is_negative() { -moved } else { moved };
        let unit_price = request.unit_price.unwrap_or(resource.cost_per_unit);
        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            resource_kind: kind,
            resource_id: id.to_string(),
            movement_type: request.movement_type,
            quantity,
            unit_price,
            total_cost: unit_price.multiply_stock(quantity),
            stock_before: change.before,
            stock_after: change.after,
            outlet_id: request.outlet_id.clone(),
            user_id: ctx.user_id.clone(),
            reference_id: None,
            notes: request.notes.clone(),
            created_at: Utc::now(),
        };
        stock.insert_movement(&mut tx, &movement).await?;

        if kind == ResourceKind::Ingredient && request.movement_type == MovementType::In {
            if let Some(price) = request.unit_price {
                self.db.catalog().update_ingredient_cost(&mut tx, id, price).await?;
            }
        }

        let outbox = self.db.outbox();
        if movement.movement_type == MovementType::In && movement.total_cost.is_positive() {
            let journal = ExpenseJournal {
                movement: movement.clone(),
                resource_name: resource.name.clone(),
            };
            outbox
                .enqueue(&mut tx, &ctx.tenant_id, OutboxKind::JournalExpense, &movement.id, &journal)
                .await?;
        }

        let mut activity = ctx.activity("STOCK_MOVEMENT", kind.as_str(), id);
        activity.outlet_id = Some(movement.outlet_id.clone());
        activity.old_value = Some(json!({ "stock": movement.stock_before }));
        activity.new_value = Some(json!({
            "stock": movement.stock_after,
            "movement_type": movement.movement_type,
        }));
        activity.reason = reason;
        outbox
            .enqueue(&mut tx, &ctx.tenant_id, OutboxKind::Activity, &movement.id, &activity)
            .await?;

        tx.commit().await.map_err(DbError::from)?;
        self.nudge_outbox();

        info!(
            kind = %kind,
            resource = %resource.name,
            movement_type = %movement.movement_type,
            before = %movement.stock_before,
            after = %movement.stock_after,
            "Stock movement recorded"
        );
        Ok(movement)
    }

    /// Deletes a ledger row and undoes its effect on stock.
    ///
    /// The resource moves by the row's signed delta rather than back to
    /// `stock_before`, so movements recorded since are kept. The undo is
    /// itself written as a ledger row.
    ///
    /// Only manual rows can be deleted. Rows written by a checkout or by a
    /// status change belong to their transaction and are compensated
    /// through [`Engine::transition_status`].
    pub async fn delete_stock_movement(
        &self,
        ctx: &TenantContext,
        id: &str,
        reason: Option<&str>,
    ) -> EngineResult<StockMovement> {
        let reason = validate_reason(reason)?;
        let stock = self.db.stock();

        let existing = {
            let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
            stock.get_movement(&mut conn, id).await?
        }
        .ok_or_else(|| EngineError::not_found("StockMovement", id))?;
        self.authorize_outlet(ctx, &existing.outlet_id).await?;
        ensure_manual(&existing)?;

        let mut tx = self.db.begin().await?;

        let movement = stock
            .get_movement(&mut tx, id)
            .await?
            .ok_or_else(|| EngineError::not_found("StockMovement", id))?;
        let kind = movement.resource_kind;
        let resource_id = movement.resource_id.as_str();

        let undo = -movement.delta();
        let (movement_type, quantity, change) = if undo.is_negative() {
            let quantity = -undo;
            let change = stock.deduct(&mut tx, kind, resource_id, quantity).await?;
            (MovementType::Out, quantity, change)
        } else {
            let change = stock.add(&mut tx, kind, resource_id, undo).await?;
            (MovementType::In, undo, change)
        };

        let change = match change {
            Some(change) => change,
            None => {
                let available = stock
                    .lock_stock(&mut tx, kind, resource_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found(entity_name(kind), resource_id))?;
                return Err(CoreError::InsufficientStock {
                    shortfalls: vec![StockShortfall {
                        resource_id: resource_id.to_string(),
                        name: resource_id.to_string(),
                        available,
                        requested: quantity,
                    }],
                }
                .into());
            }
        };

        let compensation = StockMovement {
            id: Uuid::new_v4().to_string(),
            resource_kind: kind,
            resource_id: resource_id.to_string(),
            movement_type,
            quantity,
            unit_price: movement.unit_price,
            total_cost: movement.unit_price.multiply_stock(quantity),
            stock_before: change.before,
            stock_after: change.after,
            outlet_id: movement.outlet_id.clone(),
            user_id: ctx.user_id.clone(),
            reference_id: None,
            notes: Some(format!("Reverted movement {}: {}", movement.id, reason)),
            created_at: Utc::now(),
        };
        stock.insert_movement(&mut tx, &compensation).await?;
        stock.delete_movement(&mut tx, id).await?;

        let mut activity = ctx.activity("DELETE_STOCK_MOVEMENT", kind.as_str(), resource_id);
        activity.outlet_id = Some(movement.outlet_id.clone());
        activity.old_value = Some(json!({
            "movement_id": movement.id,
            "movement_type": movement.movement_type,
            "quantity": movement.quantity,
            "stock_before": movement.stock_before,
            "stock_after": movement.stock_after,
        }));
        activity.new_value = Some(json!({ "stock": change.after }));
        activity.reason = Some(reason);
        self.db
            .outbox()
            .enqueue(&mut tx, &ctx.tenant_id, OutboxKind::Activity, id, &activity)
            .await?;

        tx.commit().await.map_err(DbError::from)?;
        self.nudge_outbox();

        info!(
            movement_id = %id,
            kind = %kind,
            resource_id = %resource_id,
            after = %change.after,
            "Stock movement deleted"
        );
        Ok(compensation)
    }

    /// Trackable items and ingredients at or below their minimum.
    pub async fn low_stock(
        &self,
        ctx: &TenantContext,
        outlet_id: &str,
    ) -> EngineResult<Vec<LowStockEntry>> {
        self.authorize_outlet(ctx, outlet_id).await?;
        Ok(self.db.stock().low_stock(outlet_id).await?)
    }

    /// Count, quantity and cost per movement type.
    pub async fn movement_summary(
        &self,
        ctx: &TenantContext,
        outlet_id: &str,
    ) -> EngineResult<Vec<MovementSummary>> {
        self.authorize_outlet(ctx, outlet_id).await?;
        Ok(self.db.stock().movement_summary(outlet_id).await?)
    }

    /// The tenant's ledger, newest first.
    pub async fn list_stock_movements(
        &self,
        ctx: &TenantContext,
        filter: MovementFilter,
    ) -> EngineResult<Vec<StockMovement>> {
        validate_date_range(filter.from, filter.to)?;
        if let Some(outlet_id) = &filter.outlet_id {
            self.authorize_outlet(ctx, outlet_id).await?;
        }

        Ok(self.db.stock().list_movements(&ctx.tenant_id, &filter).await?)
    }

    async fn resource_in_outlet(
        &self,
        kind: ResourceKind,
        id: &str,
        outlet_id: &str,
    ) -> EngineResult<Resource> {
        let catalog = self.db.catalog();
        let found = match kind {
            ResourceKind::Item => catalog.get_item(id).await?.map(|item| {
                (item.outlet_id, Resource {
                    name: item.name,
                    cost_per_unit: Money::zero(),
                })
            }),
            ResourceKind::Ingredient => catalog.get_ingredient(id).await?.map(|ingredient| {
                (ingredient.outlet_id, Resource {
                    name: ingredient.name,
                    cost_per_unit: ingredient.cost_per_unit,
                })
            }),
        };

        match found {
            Some((owner, resource)) if owner == outlet_id => Ok(resource),
            _ => Err(EngineError::not_found(entity_name(kind), id)),
        }
    }
}

/// Checks a request before any lookup; returns the trimmed reason.
fn validate_movement(request: &StockMovementRequest) -> EngineResult<Option<String>> {
    match request.movement_type {
        MovementType::Sale => {
            return Err(ValidationError::InvalidValue {
                field: "movement_type".to_string(),
                value: request.movement_type.to_string(),
            }
            .into());
        }
        MovementType::Adjust => {
            if request.quantity.is_negative() {
                return Err(ValidationError::MustNotBeNegative {
                    field: "quantity".to_string(),
                }
                .into());
            }
        }
        MovementType::In | MovementType::Out => {
            if !request.quantity.is_positive() {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }
        }
    }

    if let Some(price) = request.unit_price {
        if price.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit_price".to_string(),
            }
            .into());
        }
    }

    let needs_reason = request.resource_kind == ResourceKind::Item
        && matches!(request.movement_type, MovementType::Out | MovementType::Adjust);
    if needs_reason {
        return Ok(Some(validate_reason(request.reason.as_deref())?));
    }

    Ok(request
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string))
}

/// Sale rows and rows referencing a transaction are owned by it.
fn ensure_manual(movement: &StockMovement) -> EngineResult<()> {
    if movement.movement_type == MovementType::Sale {
        return Err(ValidationError::InvalidValue {
            field: "movement_type".to_string(),
            value: movement.movement_type.to_string(),
        }
        .into());
    }

    if let Some(reference) = &movement.reference_id {
        return Err(ValidationError::InvalidValue {
            field: "reference_id".to_string(),
            value: format!("{reference} (movement belongs to a transaction)"),
        }
        .into());
    }

    Ok(())
}

fn entity_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Item => "Item",
        ResourceKind::Ingredient => "Ingredient",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutRequest;
    use crate::error::ErrorCode;
    use crate::test_support::{cash, fixture};
    use kasir_core::{CartLine, OrderType, TransactionStatus};

    fn movement(
        kind: ResourceKind,
        id: &str,
        movement_type: MovementType,
        quantity: Quantity,
    ) -> StockMovementRequest {
        StockMovementRequest {
            outlet_id: "o1".to_string(),
            resource_kind: kind,
            resource_id: id.to_string(),
            movement_type,
            quantity,
            unit_price: None,
            notes: None,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_ingredient_purchase_updates_cost_and_queues_expense() {
        let f = fixture().await;
        f.ingredient("susu", Quantity::from_units(100), 20).await;

        let mut request = movement(
            ResourceKind::Ingredient,
            "susu",
            MovementType::In,
            Quantity::from_units(1_000),
        );
        request.unit_price = Some(Money::from_major(25));

        let recorded = f.engine.record_stock_movement(&f.manager, request).await.unwrap();

        assert_eq!(recorded.stock_before, Quantity::from_units(100));
        assert_eq!(recorded.stock_after, Quantity::from_units(1_100));
        assert_eq!(recorded.total_cost, Money::from_major(25_000));

        let ingredient = f.db.catalog().get_ingredient("susu").await.unwrap().unwrap();
        assert_eq!(ingredient.cost_per_unit, Money::from_major(25));

        let events = f.db.outbox().events_for(&recorded.id).await.unwrap();
        let kinds: Vec<OutboxKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![OutboxKind::JournalExpense, OutboxKind::Activity]);
    }

    #[tokio::test]
    async fn test_free_restock_queues_no_expense() {
        let f = fixture().await;
        f.item("teh", 5_000, 3).await;

        let recorded = f
            .engine
            .record_stock_movement(
                &f.cashier,
                movement(ResourceKind::Item, "teh", MovementType::In, Quantity::from_units(5)),
            )
            .await
            .unwrap();

        assert_eq!(f.item_stock("teh").await, Quantity::from_units(8));
        let events = f.db.outbox().events_for(&recorded.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, OutboxKind::Activity);
    }

    #[tokio::test]
    async fn test_out_never_goes_below_zero() {
        let f = fixture().await;
        f.item("teh", 5_000, 3).await;

        let mut request = movement(ResourceKind::Item, "teh", MovementType::Out, Quantity::from_units(4));
        request.reason = Some("tumpah".to_string());

        let err = f.engine.record_stock_movement(&f.manager, request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert_eq!(f.item_stock("teh").await, Quantity::from_units(3));
        assert_eq!(f.count("stock_movements").await, 0);
    }

    #[tokio::test]
    async fn test_item_adjustment_needs_reason() {
        let f = fixture().await;
        f.item("teh", 5_000, 3).await;

        let request = movement(ResourceKind::Item, "teh", MovementType::Adjust, Quantity::from_units(7));
        let err = f
            .engine
            .record_stock_movement(&f.manager, request.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let request = StockMovementRequest {
            reason: Some("stock opname".to_string()),
            ..request
        };
        let recorded = f.engine.record_stock_movement(&f.manager, request).await.unwrap();

        assert_eq!(recorded.quantity, Quantity::from_units(4));
        assert_eq!(recorded.delta(), Quantity::from_units(4));
        assert_eq!(f.item_stock("teh").await, Quantity::from_units(7));
    }

    #[tokio::test]
    async fn test_adjust_down_to_zero() {
        let f = fixture().await;
        f.ingredient("gula", Quantity::from_units(40), 15).await;

        let recorded = f
            .engine
            .record_stock_movement(
                &f.manager,
                movement(ResourceKind::Ingredient, "gula", MovementType::Adjust, Quantity::zero()),
            )
            .await
            .unwrap();

        assert_eq!(recorded.delta(), Quantity::from_units(-40));
        assert_eq!(recorded.quantity, Quantity::from_units(40));
    }

    #[tokio::test]
    async fn test_invalid_movements_rejected() {
        let f = fixture().await;
        f.item("teh", 5_000, 3).await;

        for request in [
            movement(ResourceKind::Item, "teh", MovementType::Sale, Quantity::from_units(1)),
            movement(ResourceKind::Item, "teh", MovementType::In, Quantity::zero()),
        ] {
            let err = f.engine.record_stock_movement(&f.manager, request).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::ValidationError);
        }

        let err = f
            .engine
            .record_stock_movement(
                &f.manager,
                movement(ResourceKind::Ingredient, "teh", MovementType::In, Quantity::from_units(1)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_resource_of_other_outlet_not_found() {
        let f = fixture().await;
        f.item_in("o2", "teh", 5_000, 3, true).await;

        let err = f
            .engine
            .record_stock_movement(
                &f.manager,
                movement(ResourceKind::Item, "teh", MovementType::In, Quantity::from_units(1)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(f.item_stock("teh").await, Quantity::from_units(3));
    }

    #[tokio::test]
    async fn test_delete_movement_reverts_by_delta() {
        let f = fixture().await;
        f.item("teh", 5_000, 3).await;

        let restock = f
            .engine
            .record_stock_movement(
                &f.manager,
                movement(ResourceKind::Item, "teh", MovementType::In, Quantity::from_units(10)),
            )
            .await
            .unwrap();

        // A sale after the restock must survive the undo
        let request = CheckoutRequest::new("o1", OrderType::Takeaway)
            .with_line(CartLine::new("teh", 2))
            .with_payment(cash(10_000));
        f.engine.checkout(&f.cashier, request).await.unwrap();
        assert_eq!(f.item_stock("teh").await, Quantity::from_units(11));

        let compensation = f
            .engine
            .delete_stock_movement(&f.manager, &restock.id, Some("salah input"))
            .await
            .unwrap();

        assert_eq!(compensation.movement_type, MovementType::Out);
        assert_eq!(compensation.delta(), Quantity::from_units(-10));
        assert_eq!(f.item_stock("teh").await, Quantity::from_units(1));

        let ledger = f
            .db
            .stock()
            .movements_for_resource(ResourceKind::Item, "teh")
            .await
            .unwrap();
        assert!(ledger.iter().all(|m| m.id != restock.id));
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_movement_cannot_drive_stock_negative() {
        let f = fixture().await;
        f.item("teh", 5_000, 0).await;

        let restock = f
            .engine
            .record_stock_movement(
                &f.manager,
                movement(ResourceKind::Item, "teh", MovementType::In, Quantity::from_units(2)),
            )
            .await
            .unwrap();
        let request = CheckoutRequest::new("o1", OrderType::Takeaway)
            .with_line(CartLine::new("teh", 2))
            .with_payment(cash(10_000));
        f.engine.checkout(&f.cashier, request).await.unwrap();

        let err = f
            .engine
            .delete_stock_movement(&f.manager, &restock.id, Some("salah"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert_eq!(f.item_stock("teh").await, Quantity::zero());
    }

    #[tokio::test]
    async fn test_delete_movement_checks() {
        let f = fixture().await;

        let err = f
            .engine
            .delete_stock_movement(&f.manager, "nope", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = f
            .engine
            .delete_stock_movement(&f.manager, "nope", Some("salah"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_sale_rows_cannot_be_deleted() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;

        let request = CheckoutRequest::new("o1", OrderType::DineIn)
            .with_line(CartLine::new("nasi", 2))
            .with_payment(cash(50_000));
        let receipt = f.engine.checkout(&f.cashier, request).await.unwrap();
        let sale_row = receipt.movements[0].id.clone();

        let err = f
            .engine
            .delete_stock_movement(&f.manager, &sale_row, Some("salah input"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(8));

        let trx_id = receipt.transaction().id.clone();
        f.engine
            .transition_status(&f.manager, &trx_id, TransactionStatus::Cancelled, Some("batal"))
            .await
            .unwrap();
        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(10));

        let restore_row = f
            .db
            .stock()
            .movements_for_transaction(&trx_id)
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.movement_type == MovementType::In)
            .unwrap();
        let err = f
            .engine
            .delete_stock_movement(&f.manager, &restore_row.id, Some("salah input"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(f.item_stock("nasi").await, Quantity::from_units(10));
    }

    #[tokio::test]
    async fn test_reports() {
        let f = fixture().await;
        f.item("teh", 5_000, 1).await;
        f.item("kopi", 8_000, 50).await;
        f.ingredient("gula", Quantity::from_units(5), 15).await;

        let low = f.engine.low_stock(&f.cashier, "o1").await.unwrap();
        let ids: Vec<&str> = low.iter().map(|e| e.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["gula", "teh"]);

        let mut request = movement(
            ResourceKind::Ingredient,
            "gula",
            MovementType::In,
            Quantity::from_units(10),
        );
        request.unit_price = Some(Money::from_major(15));
        f.engine.record_stock_movement(&f.manager, request).await.unwrap();

        let summary = f.engine.movement_summary(&f.manager, "o1").await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].movement_type, MovementType::In);
        assert_eq!(summary[0].count, 1);
        assert_eq!(summary[0].total_cost, Money::from_major(150));

        let err = f.engine.low_stock(&f.cashier, "o2").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);
    }

    #[tokio::test]
    async fn test_list_stock_movements() {
        let f = fixture().await;
        f.item("teh", 5_000, 10).await;
        f.ingredient("gula", Quantity::from_units(5), 15).await;

        let request = CheckoutRequest::new("o1", OrderType::Takeaway)
            .with_line(CartLine::new("teh", 1))
            .with_payment(cash(5_000));
        f.engine.checkout(&f.cashier, request).await.unwrap();
        f.engine
            .record_stock_movement(
                &f.manager,
                movement(ResourceKind::Ingredient, "gula", MovementType::In, Quantity::from_units(3)),
            )
            .await
            .unwrap();

        let all = f
            .engine
            .list_stock_movements(&f.manager, MovementFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let sales = MovementFilter {
            outlet_id: Some("o1".to_string()),
            movement_type: Some(MovementType::Sale),
            ..Default::default()
        };
        let rows = f.engine.list_stock_movements(&f.manager, sales).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resource_id, "teh");

        let foreign = MovementFilter {
            outlet_id: Some("o2".to_string()),
            ..Default::default()
        };
        let err = f.engine.list_stock_movements(&f.manager, foreign).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);
    }
}
