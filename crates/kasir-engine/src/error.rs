//! # Engine Error Type
//!
//! One error type for every engine operation, with a stable machine-readable
//! code for callers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Error Flow in Kasir                               │
//! │                                                                         │
//! │  engine.checkout(ctx, request)                                          │
//! │       │                                                                 │
//! │       ├── bad input / stock / payment ── CoreError ───────┐             │
//! │       │                                                   │             │
//! │       ├── wrong tenant / role ────────── AccessDenied ────┤             │
//! │       │                                                   ▼             │
//! │       ├── sqlx / pool failure ────────── DbError ──── EngineError       │
//! │       │                                                   │             │
//! │       └── bad kasir.toml ─────────────── Config ──────────┘             │
//! │                                                           │             │
//! │                                                           ▼             │
//! │                                   err.code() == INSUFFICIENT_STOCK      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business and validation errors are raised before the unit of work
//! commits, so they never leave partial writes behind.

use serde::Serialize;
use thiserror::Error;

use kasir_core::{CoreError, ValidationError};
use kasir_db::DbError;

/// Errors returned by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Validation or business rule failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure. Propagated unmodified, never retried here.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The caller's tenant does not own the resource, or their role may
    /// not perform the operation.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Stable error codes for callers.
///
/// ```json
/// { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock: ..." }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    ItemNotFound,
    InsufficientStock,
    InsufficientPayment,
    InvalidDiscount,
    InvalidTax,
    InvalidServiceCharge,
    ReasonRequired,
    InvalidTransition,
    AccessDenied,
    NotFound,
    DatabaseError,
    ConfigError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::ItemNotFound => "ITEM_NOT_FOUND",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::InsufficientPayment => "INSUFFICIENT_PAYMENT",
            ErrorCode::InvalidDiscount => "INVALID_DISCOUNT",
            ErrorCode::InvalidTax => "INVALID_TAX",
            ErrorCode::InvalidServiceCharge => "INVALID_SERVICE_CHARGE",
            ErrorCode::ReasonRequired => "REASON_REQUIRED",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn access_denied(message: impl Into<String>) -> Self {
        EngineError::AccessDenied(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Core(core) => match core {
                CoreError::ItemNotFound(_) => ErrorCode::ItemNotFound,
                // a variant/modifier is a catalog entry the cart pointed at
                CoreError::VariantNotFound { .. } | CoreError::ModifierNotFound(_) => {
                    ErrorCode::ItemNotFound
                }
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::InsufficientPayment { .. } => ErrorCode::InsufficientPayment,
                CoreError::InvalidDiscount { .. } => ErrorCode::InvalidDiscount,
                CoreError::InvalidTax { .. } => ErrorCode::InvalidTax,
                CoreError::InvalidServiceCharge { .. } => ErrorCode::InvalidServiceCharge,
                CoreError::ReasonRequired { .. } => ErrorCode::ReasonRequired,
                CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            EngineError::Db(DbError::NotFound { .. }) => ErrorCode::NotFound,
            EngineError::Db(_) => ErrorCode::DatabaseError,
            EngineError::AccessDenied(_) => ErrorCode::AccessDenied,
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::Config(_) => ErrorCode::ConfigError,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kasir_core::{Money, TransactionStatus};

    #[test]
    fn test_codes() {
        let err: EngineError = CoreError::InsufficientPayment {
            paid: Money::from_major(10_000),
            total: Money::from_major(20_000),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::InsufficientPayment);

        let err: EngineError = ValidationError::Required {
            field: "items".to_string(),
        }
        .into();
        assert_eq!(err.code().as_str(), "VALIDATION_ERROR");

        let err: EngineError = CoreError::ReasonRequired {
            status: TransactionStatus::Void,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::ReasonRequired);

        assert_eq!(EngineError::access_denied("x").code(), ErrorCode::AccessDenied);
        assert_eq!(
            EngineError::from(DbError::PoolExhausted).code(),
            ErrorCode::DatabaseError
        );
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::InvalidServiceCharge).unwrap();
        assert_eq!(json, "\"INVALID_SERVICE_CHARGE\"");
    }
}
