//! # Error Types
//!
//! Domain-specific error types for kasir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kasir-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  kasir-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  kasir-engine errors                                                    │
//! │  └── EngineError      - What callers see, with a stable ErrorCode       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← DbError              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every business error is raised BEFORE the unit of work writes anything,
//! with one exception: `InsufficientStock` can also come out of the
//! conditional stock update inside the commit, which then rolls back.

use thiserror::Error;

use crate::money::Money;
use crate::stock::StockShortfall;
use crate::types::TransactionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Item does not exist, or does not belong to the order's outlet.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Variant does not exist or belongs to another item.
    #[error("Variant {variant_id} not found for item {item_id}")]
    VariantNotFound { item_id: String, variant_id: String },

    #[error("Modifier not found: {0}")]
    ModifierNotFound(String),

    /// One or more trackable resources cannot cover the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: 3 × Es Teh (stock 2), 1 × Nasi Goreng (stock 0)
    ///      │
    ///      ▼
    /// InsufficientStock { shortfalls: [Es Teh 2/3, Nasi Goreng 0/1] }
    ///      │
    ///      ▼
    /// UI lists every short item at once
    /// ```
    #[error("Insufficient stock: {}", describe_shortfalls(.shortfalls))]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    /// Σ payments fell short of the total by more than the tolerance.
    #[error("Insufficient payment: paid {paid}, total {total}")]
    InsufficientPayment { paid: Money, total: Money },

    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    InvalidDiscount { discount: Money, subtotal: Money },

    #[error("Tax {tax} exceeds subtotal {subtotal}")]
    InvalidTax { tax: Money, subtotal: Money },

    #[error("Service charge {service_charge} exceeds subtotal {subtotal}")]
    InvalidServiceCharge {
        service_charge: Money,
        subtotal: Money,
    },

    /// Cancelled, void, refund and failed all need a written reason.
    #[error("A reason is required to mark a transaction as {status}")]
    ReasonRequired { status: TransactionStatus },

    #[error("Cannot move transaction from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

fn describe_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| format!("{} (available {}, requested {})", s.name, s.available, s.requested))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the `validation` module before any lookup happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value is not one of the accepted options.
    #[error("Invalid {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Invalid format (e.g., malformed identifier).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
