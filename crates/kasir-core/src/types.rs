//! # Domain Types
//!
//! Core domain types used throughout Kasir.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog (read by checkout)                                             │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌────────────┐         │
//! │  │   Item     │─►│  Variant   │  │  Modifier  │  │ Ingredient │         │
//! │  │ price      │  │ price_adj  │  │ price      │  │ stock      │         │
//! │  │ track_stock│  └────────────┘  └────────────┘  │ cost/unit  │         │
//! │  │ stock      │──────── Recipe (qty per unit) ──►└────────────┘         │
//! │  └────────────┘                                                         │
//! │                                                                         │
//! │  Transaction aggregate (written by checkout)                            │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌────────────┐                 │
//! │  │ Transaction  │─►│ TransactionItem  │─►│ TxModifier │                 │
//! │  │ status       │  │ unit_price × qty │  └────────────┘                 │
//! │  │ totals       │  └──────────────────┘                                 │
//! │  └──────┬───────┘──► Payment                                            │
//! │         │                                                               │
//! │         └──────────► StockMovement (ledger, survives deletion)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity uses a UUID v4 `id` stored as TEXT. Money columns are
//! INTEGER hundredths and stock columns INTEGER thousandths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Catalog
// =============================================================================

/// A point-of-sale location belonging to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Outlet {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A sellable menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    pub id: String,
    pub outlet_id: String,
    pub name: String,

    /// Standard (dine-in / cash) price.
    pub price: Money,

    /// Delivery-platform price overrides. `None` falls back to `price`.
    pub price_gofood: Option<Money>,
    pub price_grabfood: Option<Money>,
    pub price_shopeefood: Option<Money>,

    /// Whether selling this item draws down its own stock.
    pub track_stock: bool,
    pub stock: Quantity,
    pub min_stock: Quantity,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named option of an item with a signed price adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Variant {
    pub id: String,
    pub item_id: String,
    pub name: String,
    pub price_adjust: Money,
}

/// A flat-priced add-on (extra cheese, less sugar...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Modifier {
    pub id: String,
    pub outlet_id: String,
    pub name: String,
    pub price: Money,
}

/// One edge of an item's bill of materials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Recipe {
    pub id: String,
    pub item_id: String,
    pub ingredient_id: String,
    /// Amount of the ingredient consumed per unit of the item sold.
    pub quantity: Quantity,
}

/// A raw material consumed through recipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Ingredient {
    pub id: String,
    pub outlet_id: String,
    pub name: String,
    /// Unit label (kg, liter, pcs).
    pub unit: String,
    pub stock: Quantity,
    pub cost_per_unit: Money,
    pub min_stock: Quantity,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Transaction Status
// =============================================================================

/// The lifecycle state of a transaction.
///
/// Allowed moves live in [`crate::status`]; this is only the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Held order, not yet paid.
    Pending,
    Completed,
    Cancelled,
    Void,
    Refund,
    Failed,
}

impl TransactionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Void => "void",
            TransactionStatus::Refund => "refund",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Pending
    }
}

// =============================================================================
// Order Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
}

impl OrderType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine_in",
            OrderType::Takeaway => "takeaway",
            OrderType::Delivery => "delivery",
        }
    }

    /// Parses the wire name. Returns `None` for anything outside the set.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dine_in" => Some(OrderType::DineIn),
            "takeaway" => Some(OrderType::Takeaway),
            "delivery" => Some(OrderType::Delivery),
            _ => None,
        }
    }
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::DineIn
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Transaction Aggregate
// =============================================================================

/// Transaction header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    pub id: String,
    /// Human-facing number, `TRX-...` or `HOLD-...`.
    pub transaction_number: String,
    pub order_type: OrderType,
    pub status: TransactionStatus,
    pub outlet_id: String,
    pub cashier_id: String,
    pub table_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub service_charge: Money,
    pub total: Money,
    /// Append-only audit trail. Status reasons are added as new lines.
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A line of a transaction.
/// Uses snapshot pattern to freeze item name and price at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,
    pub item_id: String,
    pub variant_id: Option<String>,
    pub item_name: String,
    /// Resolved price including tier, variant and modifiers.
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransactionModifier {
    pub id: String,
    pub transaction_item_id: String,
    pub modifier_id: String,
    pub modifier_name: String,
    pub price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub transaction_id: String,
    /// Free-form method name (cash, qris, card, gofood...).
    pub method: String,
    pub amount: Money,
    pub change_amount: Money,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A transaction line together with its modifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLine {
    pub item: TransactionItem,
    pub modifiers: Vec<TransactionModifier>,
}

/// The full persisted aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    pub lines: Vec<TransactionLine>,
    pub payments: Vec<Payment>,
}

// =============================================================================
// Cart Input
// =============================================================================

/// One requested line of a cart, before pricing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub modifier_ids: Vec<String>,
    pub notes: Option<String>,
}

impl CartLine {
    pub fn new(item_id: impl Into<String>, quantity: i64) -> Self {
        CartLine {
            item_id: item_id.into(),
            quantity,
            ..Default::default()
        }
    }

    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn with_modifier(mut self, modifier_id: impl Into<String>) -> Self {
        self.modifier_ids.push(modifier_id.into());
        self
    }
}

/// One tendered payment, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: String,
    pub amount: Money,
    #[serde(default)]
    pub change_amount: Money,
    pub reference_number: Option<String>,
}

impl PaymentInput {
    pub fn new(method: impl Into<String>, amount: Money) -> Self {
        PaymentInput {
            method: method.into(),
            amount,
            change_amount: Money::zero(),
            reference_number: None,
        }
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Which table a ledger row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Item,
    Ingredient,
}

impl ResourceKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Item => "item",
            ResourceKind::Ingredient => "ingredient",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger movement type.
///
/// ```text
///   sale    ─ automatic, written by the deduction cascade
///   IN      ─ goods received, or stock restored on cancel
///   OUT     ─ waste, spoilage, manual removal
///   ADJUST  ─ stock count: sets an absolute level
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum MovementType {
    #[serde(rename = "sale")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "sale"))]
    Sale,
    #[serde(rename = "IN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "IN"))]
    In,
    #[serde(rename = "OUT")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "OUT"))]
    Out,
    #[serde(rename = "ADJUST")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ADJUST"))]
    Adjust,
}

impl MovementType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::Sale => "sale",
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjust => "ADJUST",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sale" => Some(MovementType::Sale),
            "IN" => Some(MovementType::In),
            "OUT" => Some(MovementType::Out),
            "ADJUST" => Some(MovementType::Adjust),
            _ => None,
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only ledger row.
///
/// Ledger rows outlive the transactions that produced them: deleting a
/// transaction leaves its `sale` and restoration rows in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub resource_kind: ResourceKind,
    pub resource_id: String,
    pub movement_type: MovementType,
    /// Always non-negative; direction comes from `stock_before`/`stock_after`.
    pub quantity: Quantity,
    pub unit_price: Money,
    pub total_cost: Money,
    pub stock_before: Quantity,
    pub stock_after: Quantity,
    pub outlet_id: String,
    pub user_id: String,
    /// Transaction that caused this movement, if any.
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Signed change this row applied to the resource's stock.
    #[inline]
    pub fn delta(&self) -> Quantity {
        self.stock_after - self.stock_before
    }
}

// =============================================================================
// Outbox & Activity
// =============================================================================

/// Kind of background effect queued in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum OutboxKind {
    /// Journal entry for a completed sale.
    #[serde(rename = "journal.transaction")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "journal.transaction"))]
    JournalTransaction,
    /// Journal entry for stock purchased with a cost.
    #[serde(rename = "journal.expense")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "journal.expense"))]
    JournalExpense,
    #[serde(rename = "activity")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "activity"))]
    Activity,
}

impl OutboxKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OutboxKind::JournalTransaction => "journal.transaction",
            OutboxKind::JournalExpense => "journal.expense",
            OutboxKind::Activity => "activity",
        }
    }
}

impl fmt::Display for OutboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in the outbox queue.
/// Written in the same database transaction as the change it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OutboxEvent {
    pub id: String,
    pub tenant_id: String,
    pub kind: OutboxKind,
    /// Transaction or stock movement this event is about.
    pub aggregate_id: String,
    /// JSON body, shape depends on `kind`.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// An audit record before persistence. Serialized into `activity` outbox
/// payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub tenant_id: String,
    pub user_id: String,
    /// e.g. `CREATE_TRANSACTION`, `UPDATE_TRANSACTION_STATUS`.
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub outlet_id: Option<String>,
}

/// A persisted audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ActivityLog {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    /// JSON snapshot before the change.
    pub old_value: Option<String>,
    /// JSON snapshot after the change.
    pub new_value: Option<String>,
    pub reason: Option<String>,
    pub outlet_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
