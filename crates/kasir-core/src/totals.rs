//! # Order Totals
//!
//! ```text
//! subtotal = Σ line.subtotal
//! total    = subtotal − discount + tax + service_charge
//!
//! 0 ≤ discount, tax, service_charge ≤ subtotal
//! Σ payments ≥ total − tolerance
//! ```
//!
//! Discount, tax and service charge arrive as absolute amounts from the
//! terminal; this module only checks their bounds.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::ResolvedLine;
use crate::types::PaymentInput;
use crate::validation::validate_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub service_charge: Money,
    pub total: Money,
}

/// Computes the order totals from resolved lines.
///
/// ```rust
/// use kasir_core::money::Money;
/// use kasir_core::totals::compute_totals_from_subtotal;
///
/// let totals = compute_totals_from_subtotal(
///     Money::from_major(50_000),
///     Money::from_major(5_000),
///     Money::from_major(5_000),
///     Money::zero(),
/// ).unwrap();
/// assert_eq!(totals.total, Money::from_major(50_000));
/// ```
pub fn compute_totals(
    lines: &[ResolvedLine],
    discount: Money,
    tax: Money,
    service_charge: Money,
) -> CoreResult<OrderTotals> {
    let subtotal: Money = lines.iter().map(|l| l.subtotal).sum();
    compute_totals_from_subtotal(subtotal, discount, tax, service_charge)
}

/// Same as [`compute_totals`] for a precomputed subtotal.
pub fn compute_totals_from_subtotal(
    subtotal: Money,
    discount: Money,
    tax: Money,
    service_charge: Money,
) -> CoreResult<OrderTotals> {
    validate_amount("discount", discount)?;
    validate_amount("tax", tax)?;
    validate_amount("service_charge", service_charge)?;

    if discount > subtotal {
        return Err(CoreError::InvalidDiscount { discount, subtotal });
    }
    if tax > subtotal {
        return Err(CoreError::InvalidTax { tax, subtotal });
    }
    if service_charge > subtotal {
        return Err(CoreError::InvalidServiceCharge {
            service_charge,
            subtotal,
        });
    }

    Ok(OrderTotals {
        subtotal,
        discount,
        tax,
        service_charge,
        total: subtotal - discount + tax + service_charge,
    })
}

/// Checks that the tendered payments cover `total` within `tolerance`.
///
/// Returns the amount paid. Paying exactly `total − tolerance` succeeds.
pub fn check_payment(payments: &[PaymentInput], total: Money, tolerance: Money) -> CoreResult<Money> {
    let paid = payments
        .iter()
        .try_fold(Money::zero(), |acc, p| acc.checked_add(p.amount))
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "payments".to_string(),
            min: 0,
            max: i64::MAX,
        })?;
    if paid < total - tolerance {
        return Err(CoreError::InsufficientPayment { paid, total });
    }
    Ok(paid)
}
