//! # Stock Availability
//!
//! Advisory pre-check that every trackable item on a cart has enough
//! stock. It reads a snapshot and takes no locks; the authoritative check
//! is the conditional UPDATE inside the commit.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► aggregate by item_id ──► for each trackable item:            │
//! │                                        stock < Σ qty ? → shortfall      │
//! │                                                                         │
//! │  ALL shortfalls are collected, so the cashier sees every short item     │
//! │  in one round trip instead of fixing them one at a time.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::quantity::Quantity;
use crate::types::{CartLine, Item};

/// A resource that cannot cover its requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub resource_id: String,
    pub name: String,
    pub available: Quantity,
    pub requested: Quantity,
}

/// Outcome of [`check_availability`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockCheck {
    pub shortfalls: Vec<StockShortfall>,
}

impl StockCheck {
    pub fn is_ok(&self) -> bool {
        self.shortfalls.is_empty()
    }

    /// `Err(InsufficientStock)` carrying every shortfall, if any.
    pub fn into_result(self) -> CoreResult<()> {
        if self.shortfalls.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InsufficientStock {
                shortfalls: self.shortfalls,
            })
        }
    }
}

/// Sums line quantities per item, keeping first-seen order.
///
/// ```rust
/// use kasir_core::stock::aggregate_item_demand;
/// use kasir_core::types::CartLine;
///
/// let lines = vec![
///     CartLine::new("teh", 1),
///     CartLine::new("nasi", 2),
///     CartLine::new("teh", 3),
/// ];
/// assert_eq!(
///     aggregate_item_demand(&lines),
///     vec![("teh".to_string(), 4), ("nasi".to_string(), 2)],
/// );
/// ```
pub fn aggregate_item_demand(lines: &[CartLine]) -> Vec<(String, i64)> {
    let mut demand: Vec<(String, i64)> = Vec::new();
    for line in lines {
        match demand.iter_mut().find(|(id, _)| *id == line.item_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => demand.push((line.item_id.clone(), line.quantity)),
        }
    }
    demand
}

/// Compares requested quantities with item stock.
///
/// Items that do not track stock always pass. Items missing from `items`
/// are not reported here; the caller resolves them to `ItemNotFound`
/// before running this check.
pub fn check_availability(lines: &[CartLine], items: &[Item]) -> StockCheck {
    let shortfalls = aggregate_item_demand(lines)
        .into_iter()
        .filter_map(|(item_id, qty)| {
            let item = items.iter().find(|i| i.id == item_id)?;
            let requested = Quantity::from_units(qty);
            if item.track_stock && item.stock < requested {
                Some(StockShortfall {
                    resource_id: item.id.clone(),
                    name: item.name.clone(),
                    available: item.stock,
                    requested,
                })
            } else {
                None
            }
        })
        .collect();

    StockCheck { shortfalls }
}
