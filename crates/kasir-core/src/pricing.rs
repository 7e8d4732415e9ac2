//! # Pricing Resolver
//!
//! Turns a cart line plus its looked-up catalog rows into a final unit
//! price and line subtotal.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  first payment method ──► PriceTier                                     │
//! │                              │                                          │
//! │  Item.price ◄── or ── Item.price_gofood / grabfood / shopeefood         │
//! │      │                                                                  │
//! │      + Variant.price_adjust (signed)                                    │
//! │      + Σ Modifier.price                                                 │
//! │      = unit price              × quantity = line subtotal               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A variant or modifier id that cannot be resolved is handled by
//! [`MissingReferencePolicy`]: rejected by default, or dropped from the
//! line when the operator opts into `Skip`.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CartLine, Item, Modifier, PaymentInput, Variant};

// =============================================================================
// Price Tier
// =============================================================================

/// Which item price column applies to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    /// Base price (cash, card, qris...).
    Standard,
    Gofood,
    Grabfood,
    Shopeefood,
}

impl PriceTier {
    /// Maps a payment method name to its tier. Unknown methods are standard.
    pub fn from_method(method: &str) -> Self {
        match method.trim().to_ascii_lowercase().as_str() {
            "gofood" => PriceTier::Gofood,
            "grabfood" => PriceTier::Grabfood,
            "shopeefood" => PriceTier::Shopeefood,
            _ => PriceTier::Standard,
        }
    }

    /// The tier is taken from the FIRST payment only. An order without
    /// payments is priced as cash.
    ///
    /// ```rust
    /// use kasir_core::money::Money;
    /// use kasir_core::pricing::PriceTier;
    /// use kasir_core::types::PaymentInput;
    ///
    /// let payments = vec![
    ///     PaymentInput::new("grabfood", Money::from_major(10)),
    ///     PaymentInput::new("cash", Money::from_major(5)),
    /// ];
    /// assert_eq!(PriceTier::from_payments(&payments), PriceTier::Grabfood);
    /// assert_eq!(PriceTier::from_payments(&[]), PriceTier::Standard);
    /// ```
    pub fn from_payments(payments: &[PaymentInput]) -> Self {
        payments
            .first()
            .map(|p| PriceTier::from_method(&p.method))
            .unwrap_or(PriceTier::Standard)
    }

    /// Price of `item` in this tier, falling back to the base price when
    /// the item has no override for the channel.
    pub fn base_price(&self, item: &Item) -> Money {
        let tiered = match self {
            PriceTier::Standard => None,
            PriceTier::Gofood => item.price_gofood,
            PriceTier::Grabfood => item.price_grabfood,
            PriceTier::Shopeefood => item.price_shopeefood,
        };
        tiered.unwrap_or(item.price)
    }
}

impl Default for PriceTier {
    fn default() -> Self {
        PriceTier::Standard
    }
}

// =============================================================================
// Missing Reference Policy
// =============================================================================

/// What to do with a variant or modifier id that does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingReferencePolicy {
    /// Fail the checkout with `VariantNotFound` / `ModifierNotFound`.
    Reject,
    /// Drop the reference and price the line without it.
    Skip,
}

impl Default for MissingReferencePolicy {
    fn default() -> Self {
        MissingReferencePolicy::Reject
    }
}

// =============================================================================
// Resolved Line
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModifier {
    pub modifier_id: String,
    pub name: String,
    pub price: Money,
}

/// A cart line with its price fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLine {
    pub item_id: String,
    pub item_name: String,
    /// `None` when no variant was requested or it was skipped.
    pub variant_id: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
    pub modifiers: Vec<ResolvedModifier>,
    pub notes: Option<String>,
    /// Variant/modifier ids dropped under `MissingReferencePolicy::Skip`.
    pub skipped_references: Vec<String>,
}

/// Resolves one cart line.
///
/// `variant` and `modifiers` are whatever the catalog returned for the
/// ids on the line; anything the line asks for but the lookup did not
/// return is "missing". A variant of another item is also missing.
///
/// ```rust
/// # use chrono::Utc;
/// # use kasir_core::money::Money;
/// # use kasir_core::quantity::Quantity;
/// # use kasir_core::types::{CartLine, Item};
/// use kasir_core::pricing::{resolve_line, MissingReferencePolicy, PriceTier};
/// # let item = Item {
/// #     id: "nasi".into(), outlet_id: "o".into(), name: "Nasi Goreng".into(),
/// #     price: Money::from_major(25_000), price_gofood: None, price_grabfood: None,
/// #     price_shopeefood: None, track_stock: true, stock: Quantity::from_units(10),
/// #     min_stock: Quantity::zero(), is_active: true,
/// #     created_at: Utc::now(), updated_at: Utc::now(),
/// # };
///
/// let line = CartLine::new("nasi", 2);
/// let resolved = resolve_line(
///     &item, &line, None, &[], PriceTier::Standard, MissingReferencePolicy::Reject,
/// ).unwrap();
/// assert_eq!(resolved.subtotal, Money::from_major(50_000));
/// ```
pub fn resolve_line(
    item: &Item,
    line: &CartLine,
    variant: Option<&Variant>,
    modifiers: &[Modifier],
    tier: PriceTier,
    policy: MissingReferencePolicy,
) -> CoreResult<ResolvedLine> {
    let mut unit_price = tier.base_price(item);
    let mut skipped_references = Vec::new();
    let mut variant_id = None;

    if let Some(requested) = line.variant_id.as_deref() {
        match variant.filter(|v| v.id == requested && v.item_id == item.id) {
            Some(v) => {
                unit_price += v.price_adjust;
                variant_id = Some(v.id.clone());
            }
            None => match policy {
                MissingReferencePolicy::Reject => {
                    return Err(CoreError::VariantNotFound {
                        item_id: item.id.clone(),
                        variant_id: requested.to_string(),
                    });
                }
                MissingReferencePolicy::Skip => skipped_references.push(requested.to_string()),
            },
        }
    }

    let mut resolved_modifiers = Vec::with_capacity(line.modifier_ids.len());
    for requested in &line.modifier_ids {
        match modifiers.iter().find(|m| &m.id == requested) {
            Some(m) => {
                unit_price += m.price;
                resolved_modifiers.push(ResolvedModifier {
                    modifier_id: m.id.clone(),
                    name: m.name.clone(),
                    price: m.price,
                });
            }
            None => match policy {
                MissingReferencePolicy::Reject => {
                    return Err(CoreError::ModifierNotFound(requested.clone()));
                }
                MissingReferencePolicy::Skip => skipped_references.push(requested.clone()),
            },
        }
    }

    if unit_price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: format!("unit price of {}", item.name),
        }
        .into());
    }

    Ok(ResolvedLine {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        variant_id,
        unit_price,
        quantity: line.quantity,
        subtotal: unit_price.multiply_quantity(line.quantity),
        modifiers: resolved_modifiers,
        notes: line.notes.clone(),
        skipped_references,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;
    use chrono::Utc;

    fn item() -> Item {
        Item {
            id: "kopi".to_string(),
            outlet_id: "o1".to_string(),
            name: "Kopi Susu".to_string(),
            price: Money::from_major(20_000),
            price_gofood: Some(Money::from_major(24_000)),
            price_grabfood: None,
            price_shopeefood: Some(Money::from_major(23_000)),
            track_stock: false,
            stock: Quantity::zero(),
            min_stock: Quantity::zero(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn variant(item_id: &str, adjust: i64) -> Variant {
        Variant {
            id: "large".to_string(),
            item_id: item_id.to_string(),
            name: "Large".to_string(),
            price_adjust: Money::from_major(adjust),
        }
    }

    fn modifier(id: &str, price: i64) -> Modifier {
        Modifier {
            id: id.to_string(),
            outlet_id: "o1".to_string(),
            name: id.to_uppercase(),
            price: Money::from_major(price),
        }
    }

    #[test]
    fn test_tier_from_method() {
        assert_eq!(PriceTier::from_method("gofood"), PriceTier::Gofood);
        assert_eq!(PriceTier::from_method("GrabFood"), PriceTier::Grabfood);
        assert_eq!(PriceTier::from_method("qris"), PriceTier::Standard);
    }

    #[test]
    fn test_tier_falls_back_to_base_price() {
        let item = item();
        assert_eq!(PriceTier::Gofood.base_price(&item), Money::from_major(24_000));
        assert_eq!(PriceTier::Grabfood.base_price(&item), Money::from_major(20_000));
        assert_eq!(PriceTier::Standard.base_price(&item), Money::from_major(20_000));
    }

    #[test]
    fn test_variant_and_modifiers_added_after_tier() {
        let item = item();
        let line = CartLine::new("kopi", 3)
            .with_variant("large")
            .with_modifier("oat")
            .with_modifier("shot");
        let v = variant("kopi", 5_000);
        let mods = [modifier("oat", 4_000), modifier("shot", 3_000)];

        let resolved = resolve_line(
            &item,
            &line,
            Some(&v),
            &mods,
            PriceTier::Shopeefood,
            MissingReferencePolicy::Reject,
        )
        .unwrap();

        // 23,000 + 5,000 + 4,000 + 3,000
        assert_eq!(resolved.unit_price, Money::from_major(35_000));
        assert_eq!(resolved.subtotal, Money::from_major(105_000));
        assert_eq!(resolved.modifiers.len(), 2);
        assert_eq!(resolved.variant_id.as_deref(), Some("large"));
    }

    #[test]
    fn test_negative_variant_adjustment() {
        let item = item();
        let line = CartLine::new("kopi", 1).with_variant("large");
        let v = variant("kopi", -2_000);
        let resolved = resolve_line(
            &item,
            &line,
            Some(&v),
            &[],
            PriceTier::Standard,
            MissingReferencePolicy::Reject,
        )
        .unwrap();
        assert_eq!(resolved.unit_price, Money::from_major(18_000));
    }

    #[test]
    fn test_missing_variant_rejected_by_default() {
        let item = item();
        let line = CartLine::new("kopi", 1).with_variant("large");
        let err = resolve_line(
            &item,
            &line,
            None,
            &[],
            PriceTier::Standard,
            MissingReferencePolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::VariantNotFound { .. }));
    }

    #[test]
    fn test_variant_of_other_item_is_missing() {
        let item = item();
        let line = CartLine::new("kopi", 1).with_variant("large");
        let v = variant("teh", 5_000);
        let err = resolve_line(
            &item,
            &line,
            Some(&v),
            &[],
            PriceTier::Standard,
            MissingReferencePolicy::Reject,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::VariantNotFound { .. }));
    }

    #[test]
    fn test_skip_policy_drops_missing_references() {
        let item = item();
        let line = CartLine::new("kopi", 2)
            .with_variant("large")
            .with_modifier("oat")
            .with_modifier("ghost");
        let mods = [modifier("oat", 4_000)];

        let resolved = resolve_line(
            &item,
            &line,
            None,
            &mods,
            PriceTier::Standard,
            MissingReferencePolicy::Skip,
        )
        .unwrap();

        assert_eq!(resolved.unit_price, Money::from_major(24_000));
        assert_eq!(resolved.variant_id, None);
        assert_eq!(resolved.skipped_references, vec!["large", "ghost"]);
    }

    #[test]
    fn test_missing_modifier_rejected() {
        let item = item();
        let line = CartLine::new("kopi", 1).with_modifier("ghost");
        let err = resolve_line(
            &item,
            &line,
            None,
            &[],
            PriceTier::Standard,
            MissingReferencePolicy::Reject,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ModifierNotFound(id) if id == "ghost"));
    }

    #[test]
    fn test_negative_unit_price_is_invalid() {
        let item = item();
        let line = CartLine::new("kopi", 1).with_variant("large");
        let v = variant("kopi", -30_000);
        let err = resolve_line(
            &item,
            &line,
            Some(&v),
            &[],
            PriceTier::Standard,
            MissingReferencePolicy::Reject,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
