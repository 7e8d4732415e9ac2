//! # Recipe Expander
//!
//! Converts "N units of item X sold" into the ingredient quantities the
//! sale consumes.
//!
//! ```text
//! Nasi Goreng × 2
//!   ├── Beras  0.150 kg/unit  → 0.300 kg
//!   ├── Telur  1 pcs/unit     → 2 pcs
//!   └── Minyak 0.020 L/unit   → 0.040 L
//! ```

use serde::{Deserialize, Serialize};

use crate::quantity::Quantity;
use crate::types::Recipe;

/// Quantity of one ingredient required by a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientDemand {
    pub ingredient_id: String,
    pub quantity: Quantity,
}

/// Expands the recipe edges of one item for `quantity_sold` units.
///
/// Edges pointing at the same ingredient are merged. An item without
/// edges yields an empty list.
///
/// ```rust
/// use kasir_core::quantity::Quantity;
/// use kasir_core::recipe::expand;
/// use kasir_core::types::Recipe;
///
/// let recipes = vec![Recipe {
///     id: "r1".into(),
///     item_id: "nasi".into(),
///     ingredient_id: "beras".into(),
///     quantity: Quantity::from_units(50),
/// }];
/// let demand = expand(&recipes, 2);
/// assert_eq!(demand[0].quantity, Quantity::from_units(100));
/// ```
pub fn expand(recipes: &[Recipe], quantity_sold: i64) -> Vec<IngredientDemand> {
    let mut demand = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        add_demand(
            &mut demand,
            &recipe.ingredient_id,
            recipe.quantity.times(quantity_sold),
        );
    }
    demand
}

/// Merges several expansions so each ingredient appears once.
pub fn merge(expansions: impl IntoIterator<Item = Vec<IngredientDemand>>) -> Vec<IngredientDemand> {
    let mut merged = Vec::new();
    for demand in expansions.into_iter().flatten() {
        add_demand(&mut merged, &demand.ingredient_id, demand.quantity);
    }
    merged
}

fn add_demand(demand: &mut Vec<IngredientDemand>, ingredient_id: &str, quantity: Quantity) {
    match demand.iter_mut().find(|d| d.ingredient_id == ingredient_id) {
        Some(existing) => existing.quantity += quantity,
        None => demand.push(IngredientDemand {
            ingredient_id: ingredient_id.to_string(),
            quantity,
        }),
    }
}
