//! # kasir-core: Pure Business Logic for Kasir
//!
//! Checkout and inventory rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    kasir-engine                                 │    │
//! │  │    checkout, hold, transition_status, delete, stock movements   │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ kasir-core (THIS CRATE) ★                       │    │
//! │  │                                                                 │    │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐           │    │
//! │  │   │ pricing  │ │  stock   │ │  recipe  │ │  status  │           │    │
//! │  │   │ tiers    │ │ shortfall│ │ expander │ │ table    │           │    │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘           │    │
//! │  │   money • quantity • totals • validation • types                │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                    kasir-db (Database Layer)                    │    │
//! │  │              SQLite queries, migrations, repositories           │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Item, Transaction, StockMovement, etc.)
//! - [`money`] - Money in integer hundredths
//! - [`quantity`] - Stock quantities in integer thousandths
//! - [`pricing`] - Price tiers, variants, modifiers
//! - [`stock`] - Stock availability pre-check
//! - [`recipe`] - Recipe expansion into ingredient demand
//! - [`totals`] - Order totals and payment tolerance
//! - [`status`] - Transaction status transition table
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use kasir_core::money::Money;
//! use kasir_core::totals::compute_totals_from_subtotal;
//!
//! // Nasi goreng 25,000 × 2, discount 5,000, tax 5,000
//! let subtotal = Money::from_major(25_000).multiply_quantity(2);
//! let totals = compute_totals_from_subtotal(
//!     subtotal,
//!     Money::from_major(5_000),
//!     Money::from_major(5_000),
//!     Money::zero(),
//! ).unwrap();
//!
//! assert_eq!(totals.total, Money::from_major(50_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod quantity;
pub mod recipe;
pub mod status;
pub mod stock;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{MissingReferencePolicy, PriceTier, ResolvedLine};
pub use quantity::Quantity;
pub use stock::{StockCheck, StockShortfall};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Guards against typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest single amount a request may carry (one trillion).
///
/// Keeps every sum of request amounts far inside `i64`.
pub const MAX_AMOUNT: Money = Money::from_major(1_000_000_000_000);

/// Payments may fall short of the total by at most half a currency unit
/// (cash rounding).
pub const PAYMENT_TOLERANCE: Money = Money::from_minor(50);
