//! # Engine Error Types
//!
//! The settlement-facing error taxonomy. Everything a tender flow can
//! reject with lives here; lower layers convert in via `From`.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Engine Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Stock       │  │    Pricing      │  │       Tender            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │ Insufficient-   │  │ InvalidDiscount │  │ InsufficientTender      │ │
//! │  │   Stock         │  │ InvalidPromotion│  │ ExcessCashTender        │ │
//! │  │ ProductNotFound │  │                 │  │ PaymentNotSucceeded     │ │
//! │  │ StockEntry-     │  │                 │  │                         │ │
//! │  │   NotFound      │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Settlement    │  │   Invariants    │  │      Wrapped            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │ Transaction-    │  │ Invariant-      │  │ Validation (core)       │ │
//! │  │   NotFound      │  │   Violation     │  │ Core (money overflow)   │ │
//! │  │ PaymentRecord-  │  │ (always rolled  │  │ Store (database)        │ │
//! │  │   NotFound      │  │  back first)    │  │ Gateway (provider)      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Propagation policy: validation and business-rule errors return
//! synchronously with a descriptive message and leave the data model
//! untouched. Only `Store` and `Gateway` are unexpected faults worth
//! logging at error level.

use thiserror::Error;

use crate::gateway::GatewayError;
use meridian_core::{CoreError, Money, ValidationError};
use meridian_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Settlement engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Stock
    // =========================================================================
    /// A line requested more units than the product has on hand.
    ///
    /// Local to one line item, never fatal to the service; the whole
    /// transaction it belonged to rolls back.
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: String,
        requested: i64,
        available: i64,
    },

    /// Product missing or inactive.
    #[error("Product not found: {id}")]
    ProductNotFound { id: String },

    /// Stock ledger entry missing.
    #[error("Stock entry not found: {id}")]
    StockEntryNotFound { id: String },

    // =========================================================================
    // Pricing
    // =========================================================================
    /// Discount code unknown, inactive, or outside its validity window.
    #[error("Invalid or expired discount code: {code}")]
    InvalidDiscount { code: String },

    /// Promotion unknown, inactive, or outside its validity window.
    #[error("Invalid or expired promotion: {name}")]
    InvalidPromotion { name: String },

    // =========================================================================
    // Tender
    // =========================================================================
    /// Cash tendered does not cover the total.
    #[error("Insufficient tender: {tendered} offered against a total of {total}")]
    InsufficientTender { total: Money, tendered: Money },

    /// The cash leg of a split exceeds the total.
    #[error("Cash portion {cash} exceeds the transaction total {total}")]
    ExcessCashTender { total: Money, cash: Money },

    /// The gateway reports the intent in a non-succeeded state.
    #[error("Payment not succeeded (gateway status: {status})")]
    PaymentNotSucceeded { status: String },

    // =========================================================================
    // Settlement lookups
    // =========================================================================
    /// No transaction with this id.
    #[error("Transaction not found: {id}")]
    TransactionNotFound { id: String },

    /// A split confirm arrived for a transaction with no payment row.
    ///
    /// ## When This Occurs
    /// Bad caller input, a confirm racing the initiating request, or a
    /// zero-cash split (which records no payment row; all-card tenders
    /// belong on the card path).
    #[error("No payment record for transaction {transaction_id}")]
    PaymentRecordNotFound { transaction_id: String },

    // =========================================================================
    // Invariants
    // =========================================================================
    /// An operation would have broken a persisted invariant (stock below
    /// zero, double reversal, double void). Nothing was persisted.
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    // =========================================================================
    // Wrapped lower layers
    // =========================================================================
    /// Input validation failure from the core layer.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Core domain failure (monetary overflow).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database failure.
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    /// Card-gateway transport or provider failure. Never retried by the
    /// engine; the caller re-initiates.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl EngineError {
    /// Shorthand for an invariant violation with a formatted message.
    pub fn invariant(message: impl Into<String>) -> Self {
        EngineError::InvariantViolation {
            message: message.into(),
        }
    }
}

/// sqlx failures surface through the store variant so engine code can use
/// `?` directly on `pool().begin()` / `commit()`.
impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Store(DbError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = EngineError::InsufficientStock {
            sku: "BEV-001".to_string(),
            requested: 5,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for BEV-001: requested 5, available 2"
        );
    }

    #[test]
    fn test_tender_messages_format_as_money() {
        let err = EngineError::InsufficientTender {
            total: Money::from_cents(3400),
            tendered: Money::from_cents(3000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient tender: $30.00 offered against a total of $34.00"
        );
    }

    #[test]
    fn test_validation_error_is_transparent() {
        let err = EngineError::from(ValidationError::EmptyCart);
        assert_eq!(err.to_string(), "Cart is empty");
    }

    #[test]
    fn test_sqlx_error_maps_to_store() {
        let err = EngineError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, EngineError::Store(_)));
    }
}
