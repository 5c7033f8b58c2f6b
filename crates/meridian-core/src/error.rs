//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                       │
//! │  ├── CoreError        - Pure domain failures                            │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  meridian-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  meridian-engine errors (separate crate)                                │
//! │  └── EngineError      - Settlement/stock/pricing rule failures          │
//! │                                                                         │
//! │  HTTP API errors (in server)                                            │
//! │  └── ApiError         - What callers see (serialized)                   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → ApiError → Caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (quantity, field, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message
//!
//! Business-rule failures that need database state (insufficient stock,
//! unknown product, expired discount) live in meridian-engine's error type;
//! this crate only knows about failures it can detect purely.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Pure domain errors.
///
/// These are failures the core can detect without touching a database or
/// the network. Orchestration-level failures live in meridian-engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Monetary arithmetic overflowed i64 cents.
    ///
    /// ## When This Occurs
    /// - A line total (`quantity × unit_price`) exceeds i64 range
    /// - Summing line totals overflows
    ///
    /// In practice this means garbage input; no real cart reaches
    /// 92 quadrillion cents.
    #[error("Monetary amount overflowed")]
    MoneyOverflow,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any settlement logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A cart was submitted with no lines at all.
    ///
    /// ## When This Occurs
    /// - Caller sends `items: []` to any tender operation
    /// - Front-end cleared the cart between render and submit
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line's quantity is zero or negative.
    ///
    /// Every line must sell at least one unit; quantity is never a
    /// signed adjustment (the stock ledger owns those).
    #[error("Invalid quantity: {quantity} (must be positive)")]
    InvalidQuantity { quantity: i64 },

    /// Cart has exceeded the maximum number of lines.
    #[error("Cart cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// A cart line's quantity exceeds the per-line maximum.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

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

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Invalid format (e.g., invalid UUID, bad characters in a SKU).
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(ValidationError::EmptyCart.to_string(), "Cart is empty");

        let err = ValidationError::InvalidQuantity { quantity: -2 };
        assert_eq!(err.to_string(), "Invalid quantity: -2 (must be positive)");

        let err = ValidationError::TooManyLines { max: 100 };
        assert_eq!(err.to_string(), "Cart cannot have more than 100 lines");

        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::EmptyCart;
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: Cart is empty");
    }

    #[test]
    fn test_money_overflow_message() {
        assert_eq!(
            CoreError::MoneyOverflow.to_string(),
            "Monetary amount overflowed"
        );
    }
}
