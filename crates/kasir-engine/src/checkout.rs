//! # Checkout
//!
//! Turns a cart into a completed sale in one unit of work.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Flow                                    │
//! │                                                                         │
//! │  1. validate input ─────────────── order type, lines, amounts, payments │
//! │  2. authorize outlet ───────────── outlet belongs to caller's tenant    │
//! │  3. load items, stock pre-check ── every shortfall reported at once     │
//! │  4. price lines, totals, payment ─ tier from payment method             │
//! │           │                                                             │
//! │           ▼   BEGIN                                                     │
//! │  5. header, lines, modifiers, payments                                  │
//! │  6. deduct tracked items ───────── conditional UPDATE; miss = rollback  │
//! │  7. deduct recipe ingredients ──── one savepoint each; miss = skip      │
//! │  8. queue journal + activity ───── outbox rows                          │
//! │           │                                                             │
//! │           ▼   COMMIT, nudge outbox worker                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is written before step 5, so every error in steps 1-4 leaves
//! the database untouched. An item that runs short between the pre-check
//! and step 6 rolls the whole sale back.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, warn};
use uuid::Uuid;

use kasir_core::pricing::resolve_line;
use kasir_core::recipe::{self, IngredientDemand};
use kasir_core::stock::{aggregate_item_demand, check_availability};
use kasir_core::totals::{check_payment, compute_totals, compute_totals_from_subtotal, OrderTotals};
use kasir_core::validation::{
    validate_amount, validate_cart_lines, validate_order_type, validate_payment, validate_required,
};
use kasir_core::{
    CartLine, CoreError, Item, Money, MovementType, OrderType, OutboxKind, Payment, PaymentInput,
    PriceTier, Quantity, ResolvedLine, ResourceKind, StockMovement, StockShortfall, Transaction,
    TransactionDetail, TransactionItem, TransactionLine, TransactionModifier, TransactionStatus,
};
use kasir_db::{generate_transaction_number, DbError};

use crate::context::TenantContext;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::hooks::TransactionJournal;

// =============================================================================
// Requests & Receipts
// =============================================================================

/// A cart ready to be paid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutRequest {
    pub outlet_id: String,
    /// `dine_in`, `takeaway` or `delivery`.
    pub order_type: String,
    pub lines: Vec<CartLine>,
    pub payments: Vec<PaymentInput>,
    pub discount: Money,
    pub tax: Money,
    pub service_charge: Money,
    pub table_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn new(outlet_id: impl Into<String>, order_type: OrderType) -> Self {
        CheckoutRequest {
            outlet_id: outlet_id.into(),
            order_type: order_type.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn with_line(mut self, line: CartLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn with_payment(mut self, payment: PaymentInput) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = tax;
        self
    }

    pub fn with_service_charge(mut self, service_charge: Money) -> Self {
        self.service_charge = service_charge;
        self
    }
}

/// An ingredient the sale could not deduct. The sale itself went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDeduction {
    pub ingredient_id: String,
    pub quantity: Quantity,
    pub reason: String,
}

/// Everything a completed checkout produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub detail: TransactionDetail,
    pub totals: OrderTotals,
    pub paid: Money,
    /// Sale ledger rows, items first, then ingredients.
    pub movements: Vec<StockMovement>,
    pub skipped_deductions: Vec<SkippedDeduction>,
    /// Variant/modifier ids dropped under the `skip` policy.
    pub skipped_references: Vec<String>,
}

impl CheckoutReceipt {
    pub fn transaction(&self) -> &Transaction {
        &self.detail.transaction
    }
}

/// A parked order: header only, paid and deducted later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldRequest {
    pub outlet_id: String,
    /// Defaults to `dine_in`.
    pub order_type: Option<String>,
    pub table_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub service_charge: Money,
    pub total: Money,
    pub notes: Option<String>,
}

// =============================================================================
// Operations
// =============================================================================

impl Engine {
    /// Completes a sale: validates, prices, deducts stock and queues the
    /// journal entry, all or nothing.
    ///
    /// Ingredient deductions are the exception: an ingredient that cannot
    /// be deducted is logged and reported in
    /// [`CheckoutReceipt::skipped_deductions`] without failing the sale.
    pub async fn checkout(
        &self,
        ctx: &TenantContext,
        request: CheckoutRequest,
    ) -> EngineResult<CheckoutReceipt> {
        let settings = &self.config.checkout;

        let order_type = validate_order_type(&request.order_type)?;
        validate_cart_lines(&request.lines, settings.max_cart_lines)?;
        validate_amount("discount", request.discount)?;
        validate_amount("tax", request.tax)?;
        validate_amount("service_charge", request.service_charge)?;
        for payment in &request.payments {
            validate_payment(payment)?;
        }

        let outlet = self.authorize_outlet(ctx, &request.outlet_id).await?;
        let catalog = self.db.catalog();

        // Items, scoped to the outlet so another outlet's ids never resolve
        let demand = aggregate_item_demand(&request.lines);
        let item_ids: Vec<String> = demand.iter().map(|(id, _)| id.clone()).collect();
        let items = catalog.get_items_in_outlet(&outlet.id, &item_ids).await?;
        let by_id: HashMap<&str, &Item> = items.iter().map(|i| (i.id.as_str(), i)).collect();
        if let Some(missing) = item_ids.iter().find(|id| !by_id.contains_key(id.as_str())) {
            return Err(CoreError::ItemNotFound(missing.clone()).into());
        }

        check_availability(&request.lines, &items).into_result()?;

        // Pricing
        let mut modifier_ids: Vec<String> = Vec::new();
        for id in request.lines.iter().flat_map(|l| l.modifier_ids.iter()) {
            if !modifier_ids.contains(id) {
                modifier_ids.push(id.clone());
            }
        }
        let modifiers = catalog.get_modifiers_in_outlet(&outlet.id, &modifier_ids).await?;
        let tier = PriceTier::from_payments(&request.payments);

        let mut resolved = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let item = lookup(&by_id, &line.item_id)?;
            let variant = match &line.variant_id {
                Some(variant_id) => catalog.get_variant(variant_id).await?,
                None => None,
            };
            let line = resolve_line(
                item,
                line,
                variant.as_ref(),
                &modifiers,
                tier,
                settings.missing_reference_policy,
            )?;
            if !line.skipped_references.is_empty() {
                warn!(
                    item_id = %line.item_id,
                    skipped = ?line.skipped_references,
                    "Dropped unknown variant/modifier references"
                );
            }
            resolved.push(line);
        }

        let totals = compute_totals(
            &resolved,
            request.discount,
            request.tax,
            request.service_charge,
        )?;
        let paid = check_payment(&request.payments, totals.total, settings.payment_tolerance())?;

        debug!(
            outlet_id = %outlet.id,
            tier = ?tier,
            lines = resolved.len(),
            total = %totals.total,
            paid = %paid,
            "Checkout priced"
        );

        // Rows to write
        let now = Utc::now();
        let trx = Transaction {
            id: Uuid::new_v4().to_string(),
            transaction_number: generate_transaction_number("TRX"),
            order_type,
            status: TransactionStatus::Completed,
            outlet_id: outlet.id.clone(),
            cashier_id: ctx.user_id.clone(),
            table_id: request.table_id,
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            subtotal: totals.subtotal,
            discount: totals.discount,
            tax: totals.tax,
            service_charge: totals.service_charge,
            total: totals.total,
            notes: request.notes,
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        };
        let lines: Vec<TransactionLine> = resolved.iter().map(|l| line_rows(&trx.id, l)).collect();
        let payments: Vec<Payment> = request
            .payments
            .iter()
            .map(|p| Payment {
                id: Uuid::new_v4().to_string(),
                transaction_id: trx.id.clone(),
                method: p.method.clone(),
                amount: p.amount,
                change_amount: p.change_amount,
                reference_number: p.reference_number.clone(),
                created_at: now,
            })
            .collect();

        // Unit of work
        let mut tx = self.db.begin().await?;
        let trx_repo = self.db.transactions();

        trx_repo.insert_transaction(&mut tx, &trx).await?;
        for line in &lines {
            trx_repo.insert_item(&mut tx, &line.item).await?;
            for modifier in &line.modifiers {
                trx_repo.insert_modifier(&mut tx, modifier).await?;
            }
        }
        for payment in &payments {
            trx_repo.insert_payment(&mut tx, payment).await?;
        }

        let mut movements = Vec::new();
        for (item_id, qty) in &demand {
            let item = lookup(&by_id, item_id)?;
            if item.track_stock {
                movements.push(self.deduct_item(&mut tx, ctx, &trx, item, *qty).await?);
            }
        }

        let skipped_deductions = self
            .deduct_ingredients(&mut tx, ctx, &trx, &demand, &mut movements)
            .await;

        let outbox = self.db.outbox();
        let journal = TransactionJournal {
            transaction: trx.clone(),
            payments: payments.clone(),
        };
        outbox
            .enqueue(&mut tx, &ctx.tenant_id, OutboxKind::JournalTransaction, &trx.id, &journal)
            .await?;

        let mut activity = ctx.activity("CREATE_TRANSACTION", "transaction", &trx.id);
        activity.outlet_id = Some(trx.outlet_id.clone());
        activity.new_value = Some(json!({
            "transaction_number": trx.transaction_number,
            "total": trx.total,
            "lines": lines.len(),
        }));
        outbox
            .enqueue(&mut tx, &ctx.tenant_id, OutboxKind::Activity, &trx.id, &activity)
            .await?;

        tx.commit().await.map_err(DbError::from)?;
        self.nudge_outbox();

        info!(
            transaction_number = %trx.transaction_number,
            outlet_id = %trx.outlet_id,
            total = %trx.total,
            movements = movements.len(),
            skipped = skipped_deductions.len(),
            "Checkout completed"
        );

        let skipped_references = resolved
            .into_iter()
            .flat_map(|l| l.skipped_references)
            .collect();

        Ok(CheckoutReceipt {
            detail: TransactionDetail {
                transaction: trx,
                lines,
                payments,
            },
            totals,
            paid,
            movements,
            skipped_deductions,
            skipped_references,
        })
    }

    /// Parks an order as `pending`. No lines are stored and no stock moves.
    pub async fn hold(&self, ctx: &TenantContext, request: HoldRequest) -> EngineResult<Transaction> {
        validate_required("outlet_id", &request.outlet_id)?;
        let order_type = match request.order_type.as_deref() {
            Some(value) => validate_order_type(value)?,
            None => OrderType::default(),
        };
        validate_amount("subtotal", request.subtotal)?;
        validate_amount("total", request.total)?;
        // Bounds the adjustments by the subtotal; the caller's total is kept
        compute_totals_from_subtotal(
            request.subtotal,
            request.discount,
            request.tax,
            request.service_charge,
        )?;

        let outlet = self.authorize_outlet(ctx, &request.outlet_id).await?;

        let now = Utc::now();
        let trx = Transaction {
            id: Uuid::new_v4().to_string(),
            transaction_number: generate_transaction_number("HOLD"),
            order_type,
            status: TransactionStatus::Pending,
            outlet_id: outlet.id,
            cashier_id: ctx.user_id.clone(),
            table_id: request.table_id,
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            subtotal: request.subtotal,
            discount: request.discount,
            tax: request.tax,
            service_charge: request.service_charge,
            total: request.total,
            notes: Some(held_note(request.notes.as_deref())),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let mut tx = self.db.begin().await?;
        self.db.transactions().insert_transaction(&mut tx, &trx).await?;

        let mut activity = ctx.activity("HOLD_TRANSACTION", "transaction", &trx.id);
        activity.outlet_id = Some(trx.outlet_id.clone());
        activity.new_value = Some(json!({ "transaction_number": trx.transaction_number }));
        self.db
            .outbox()
            .enqueue(&mut tx, &ctx.tenant_id, OutboxKind::Activity, &trx.id, &activity)
            .await?;

        tx.commit().await.map_err(DbError::from)?;
        self.nudge_outbox();

        info!(transaction_number = %trx.transaction_number, "Order held");
        Ok(trx)
    }

    /// Pending orders the calling cashier parked, newest first.
    pub async fn held_orders(&self, ctx: &TenantContext) -> EngineResult<Vec<Transaction>> {
        let pending = self
            .db
            .transactions()
            .list_pending_for_tenant(&ctx.tenant_id)
            .await?;

        Ok(pending
            .into_iter()
            .filter(|t| t.cashier_id == ctx.user_id)
            .collect())
    }

    // =========================================================================
    // Deduction Cascade
    // =========================================================================

    /// Conditional item deduction plus its `sale` ledger row.
    async fn deduct_item(
        &self,
        conn: &mut SqliteConnection,
        ctx: &TenantContext,
        trx: &Transaction,
        item: &Item,
        quantity: i64,
    ) -> EngineResult<StockMovement> {
        let stock = self.db.stock();
        let qty = Quantity::from_units(quantity);

        let change = match stock.deduct(conn, ResourceKind::Item, &item.id, qty).await? {
            Some(change) => change,
            None => {
                // Lost a race since the pre-check
                let available = stock
                    .lock_stock(conn, ResourceKind::Item, &item.id)
                    .await?
                    .unwrap_or_default();
                warn!(item_id = %item.id, available = %available, requested = %qty, "Stock ran out during checkout");
                return Err(CoreError::InsufficientStock {
                    shortfalls: vec![StockShortfall {
                        resource_id: item.id.clone(),
                        name: item.name.clone(),
                        available,
                        requested: qty,
                    }],
                }
                .into());
            }
        };

        let movement = sale_movement(
            ctx,
            trx,
            ResourceKind::Item,
            &item.id,
            qty,
            Money::zero(),
            change.before,
            change.after,
        );
        stock.insert_movement(conn, &movement).await?;
        Ok(movement)
    }

    /// Expands recipes for every sold item and deducts the merged demand.
    ///
    /// Never fails the sale: a recipe lookup error counts as "no recipe",
    /// and each ingredient that cannot be deducted becomes a
    /// [`SkippedDeduction`].
    async fn deduct_ingredients(
        &self,
        conn: &mut SqliteConnection,
        ctx: &TenantContext,
        trx: &Transaction,
        demand: &[(String, i64)],
        movements: &mut Vec<StockMovement>,
    ) -> Vec<SkippedDeduction> {
        let catalog = self.db.catalog();

        let mut expansions = Vec::with_capacity(demand.len());
        for (item_id, qty) in demand {
            match catalog.recipes_for_item(conn, item_id).await {
                Ok(recipes) => expansions.push(recipe::expand(&recipes, *qty)),
                Err(e) => warn!(item_id = %item_id, error = %e, "Recipe lookup failed, treating as no recipe"),
            }
        }

        let mut skipped = Vec::new();
        for ingredient in recipe::merge(expansions) {
            match self.deduct_ingredient(conn, ctx, trx, &ingredient).await {
                Ok(movement) => movements.push(movement),
                Err(e) => {
                    warn!(
                        transaction_number = %trx.transaction_number,
                        ingredient_id = %ingredient.ingredient_id,
                        quantity = %ingredient.quantity,
                        error = %e,
                        "Ingredient deduction skipped"
                    );
                    skipped.push(SkippedDeduction {
                        ingredient_id: ingredient.ingredient_id,
                        quantity: ingredient.quantity,
                        reason: e.to_string(),
                    });
                }
            }
        }

        skipped
    }

    /// One ingredient inside its own savepoint, so a failure leaves the
    /// rest of the sale intact.
    async fn deduct_ingredient(
        &self,
        conn: &mut SqliteConnection,
        ctx: &TenantContext,
        trx: &Transaction,
        demand: &IngredientDemand,
    ) -> EngineResult<StockMovement> {
        let mut savepoint = conn.begin().await.map_err(DbError::from)?;
        let stock = self.db.stock();

        let ingredient = self
            .db
            .catalog()
            .get_ingredient_in(&mut savepoint, &demand.ingredient_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Ingredient", &demand.ingredient_id))?;

        let change = stock
            .deduct(&mut savepoint, ResourceKind::Ingredient, &ingredient.id, demand.quantity)
            .await?
            .ok_or_else(|| CoreError::InsufficientStock {
                shortfalls: vec![StockShortfall {
                    resource_id: ingredient.id.clone(),
                    name: ingredient.name.clone(),
                    available: ingredient.stock,
                    requested: demand.quantity,
                }],
            })?;

        let movement = sale_movement(
            ctx,
            trx,
            ResourceKind::Ingredient,
            &ingredient.id,
            demand.quantity,
            ingredient.cost_per_unit,
            change.before,
            change.after,
        );
        stock.insert_movement(&mut savepoint, &movement).await?;

        savepoint.commit().await.map_err(DbError::from)?;
        Ok(movement)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn held_note(notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("Held order - {notes}"),
        None => "Held order".to_string(),
    }
}

fn lookup<'a>(items: &HashMap<&str, &'a Item>, id: &str) -> EngineResult<&'a Item> {
    items
        .get(id)
        .copied()
        .ok_or_else(|| CoreError::ItemNotFound(id.to_string()).into())
}

fn line_rows(transaction_id: &str, line: &ResolvedLine) -> TransactionLine {
    let item_row_id = Uuid::new_v4().to_string();
    TransactionLine {
        item: TransactionItem {
            id: item_row_id.clone(),
            transaction_id: transaction_id.to_string(),
            item_id: line.item_id.clone(),
            variant_id: line.variant_id.clone(),
            item_name: line.item_name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            subtotal: line.subtotal,
            notes: line.notes.clone(),
        },
        modifiers: line
            .modifiers
            .iter()
            .map(|m| TransactionModifier {
                id: Uuid::new_v4().to_string(),
                transaction_item_id: item_row_id.clone(),
                modifier_id: m.modifier_id.clone(),
                modifier_name: m.name.clone(),
                price: m.price,
            })
            .collect(),
    }
}

#[allow(clippy::too_many_arguments)]
fn sale_movement(
    ctx: &TenantContext,
    trx: &Transaction,
    kind: ResourceKind,
    resource_id: &str,
    quantity: Quantity,
    unit_price: Money,
    stock_before: Quantity,
    stock_after: Quantity,
) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4().to_string(),
        resource_kind: kind,
        resource_id: resource_id.to_string(),
        movement_type: MovementType::Sale,
        quantity,
        unit_price,
        total_cost: unit_price.multiply_stock(quantity),
        stock_before,
        stock_after,
        outlet_id: trx.outlet_id.clone(),
        user_id: ctx.user_id.clone(),
        reference_id: Some(trx.id.clone()),
        notes: Some(format!("Sale {}", trx.transaction_number)),
        created_at: Utc::now(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
