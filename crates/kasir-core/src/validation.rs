//! # Validation Module
//!
//! Input validation for checkout, hold and stock-movement requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure, before any lookup)                         │
//! │  ├── Required fields, enums, ranges                                     │
//! │  └── Money amounts non-negative, payments positive                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine (after lookups, still before writes)                   │
//! │  ├── Outlet belongs to tenant                                           │
//! │  └── Stock availability, totals, payment tolerance                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── UNIQUE transaction_number                                          │
//! │  ├── Foreign key constraints                                            │
//! │  └── Conditional stock UPDATE (stock >= qty)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{CartLine, OrderType, PaymentInput};
use crate::{MAX_AMOUNT, MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text reason or note accepted.
pub const MAX_REASON_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that an identifier field is present.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Parses and validates an order type.
///
/// ```rust
/// use kasir_core::validation::validate_order_type;
/// use kasir_core::types::OrderType;
///
/// assert_eq!(validate_order_type("takeaway").unwrap(), OrderType::Takeaway);
/// assert!(validate_order_type("drive_thru").is_err());
/// ```
pub fn validate_order_type(value: &str) -> ValidationResult<OrderType> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "order_type".to_string(),
        });
    }

    OrderType::parse(value.trim()).ok_or_else(|| ValidationError::InvalidValue {
        field: "order_type".to_string(),
        value: value.to_string(),
    })
}

/// Validates a status-change or adjustment reason and returns it trimmed.
///
/// Whitespace-only counts as missing.
pub fn validate_reason(reason: Option<&str>) -> ValidationResult<String> {
    let reason = reason.map(str::trim).unwrap_or_default();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(reason.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an order-level amount (discount, tax, service charge).
///
/// ```rust
/// use kasir_core::money::Money;
/// use kasir_core::validation::validate_amount;
///
/// assert!(validate_amount("discount", Money::zero()).is_ok());
/// assert!(validate_amount("discount", Money::from_minor(-1)).is_err());
/// ```
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if amount > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT.minor(),
        });
    }

    Ok(())
}

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0) and at most `MAX_AMOUNT`
/// - Change amount must not be negative
pub fn validate_payment(payment: &PaymentInput) -> ValidationResult<()> {
    validate_required("payment method", &payment.method)?;

    if !payment.amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    if payment.amount > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: "payment amount".to_string(),
            min: 1,
            max: MAX_AMOUNT.minor(),
        });
    }

    validate_amount("change amount", payment.change_amount)
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the lines of a cart.
///
/// ## Rules
/// - At least one line
/// - At most `max_lines` lines
/// - Every line names an item and has a quantity in range
pub fn validate_cart_lines(lines: &[CartLine], max_lines: usize) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines.len() > max_lines {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: max_lines as i64,
        });
    }

    for line in lines {
        validate_required("item_id", &line.item_id)?;
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

/// Cart validation with the crate-wide default line limit.
pub fn validate_cart(lines: &[CartLine]) -> ValidationResult<()> {
    validate_cart_lines(lines, MAX_CART_LINES)
}

/// A listing range must not end before it starts. Open ends are fine.
pub fn validate_date_range(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> ValidationResult<()> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(ValidationError::InvalidValue {
            field: "date range".to_string(),
            value: format!("{} > {}", from.to_rfc3339(), to.to_rfc3339()),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason(Some("  wrong order ")).unwrap(), "wrong order");
        assert!(validate_reason(None).is_err());
        assert!(validate_reason(Some("   ")).is_err());
        assert!(validate_reason(Some(&"x".repeat(MAX_REASON_LEN + 1))).is_err());
    }

    #[test]
    fn test_validate_cart_lines() {
        assert!(validate_cart(&[]).is_err());
        assert!(validate_cart(&[CartLine::new("item-1", 2)]).is_ok());
        assert!(validate_cart(&[CartLine::new("", 2)]).is_err());
        assert!(validate_cart(&[CartLine::new("item-1", 0)]).is_err());

        let too_many: Vec<CartLine> = (0..3).map(|i| CartLine::new(format!("i{i}"), 1)).collect();
        assert!(validate_cart_lines(&too_many, 2).is_err());
        assert!(validate_cart_lines(&too_many, 3).is_ok());
    }

    #[test]
    fn test_validate_payment() {
        assert!(validate_payment(&PaymentInput::new("cash", Money::from_major(10))).is_ok());
        assert!(validate_payment(&PaymentInput::new("cash", Money::zero())).is_err());
        assert!(validate_payment(&PaymentInput::new("", Money::from_major(10))).is_err());

        let mut negative_change = PaymentInput::new("cash", Money::from_major(10));
        negative_change.change_amount = Money::from_minor(-1);
        assert!(validate_payment(&negative_change).is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::hours(1);

        assert!(validate_date_range(None, None).is_ok());
        assert!(validate_date_range(Some(now), None).is_ok());
        assert!(validate_date_range(Some(earlier), Some(now)).is_ok());
        assert!(validate_date_range(Some(now), Some(now)).is_ok());
        assert!(validate_date_range(Some(now), Some(earlier)).is_err());
    }

    #[test]
    fn test_amounts_are_capped() {
        assert!(validate_payment(&PaymentInput::new("cash", MAX_AMOUNT)).is_ok());
        assert!(matches!(
            validate_payment(&PaymentInput::new("cash", Money::from_minor(i64::MAX))),
            Err(ValidationError::OutOfRange { .. })
        ));

        assert!(validate_amount("discount", MAX_AMOUNT).is_ok());
        assert!(matches!(
            validate_amount("discount", MAX_AMOUNT + Money::from_minor(1)),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
