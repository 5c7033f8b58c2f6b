//! # Validation Module
//!
//! Input validation utilities for Meridian POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (axum + serde)                                 │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── Shape checks (missing fields, wrong types)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (settlement engine entry points)                 │
//! │  ├── Cart shape (empty, too many lines)                                │
//! │  ├── Quantity and amount ranges                                        │
//! │  └── Identifier formats                                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints                                                │
//! │  └── CHECK(stock >= 0) backstop                                        │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use meridian_core::validation::{validate_sku, validate_quantity};
//!
//! // Validate SKU before database insert
//! validate_sku("COLA-330").unwrap();
//!
//! // Validate quantity before pricing a cart line
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::CartLine;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Should contain only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use meridian_core::validation::validate_sku;
///
/// assert!(validate_sku("COLA-330").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    // Check for valid characters (alphanumeric, hyphen, underscore)
    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 200 characters
///
/// ## Example
/// ```rust
/// use meridian_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Cola 330ml").is_ok());
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a discount code.
///
/// ## Rules
/// - Must not be empty
/// - Maximum 50 characters
/// - Alphanumeric, hyphens, underscores only (codes are typed at a till)
pub fn validate_discount_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "discount_code".to_string(),
        });
    }

    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "discount_code".to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "discount_code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a stock ledger note.
///
/// ## Rules
/// - Optional, but at most 500 characters when present
pub fn validate_note(note: &str) -> ValidationResult<()> {
    if note.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: 500,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Tender request: line { product, quantity: 5 }                          │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "Invalid quantity"                        │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "Quantity exceeds maximum"               │
/// │       │                                                                 │
/// │       └── OK → Proceed to pricing and stock decrement                  │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::InvalidQuantity { quantity: qty });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::QuantityTooLarge {
            requested: qty,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
///
/// ## Example
/// ```rust
/// use meridian_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());  // $10.99
/// assert!(validate_price_cents(0).is_ok());     // Free item
/// assert!(validate_price_cents(-100).is_err()); // Invalid
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the cash amount of a tender, in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (a split tender can be all-card)
///
/// Whether the amount is *enough* is a settlement rule, not a validation
/// rule; the engine compares it against the cart total separately.
pub fn validate_cash_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "cash_amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a stock ledger delta.
///
/// ## Rules
/// - Must not be zero (an entry that moves nothing is a mistake)
/// - Either sign is fine: positive restocks, negative corrects
pub fn validate_stock_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "delta".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the shape of a cart before any pricing or stock work.
///
/// ## Rules
/// - Must contain at least one line (EmptyCart)
/// - Must not exceed MAX_CART_LINES (100)
/// - Every line quantity must pass `validate_quantity`
///
/// Duplicate product lines are allowed and stay separate; merging them is
/// a front-end concern, never done here.
pub fn validate_cart_lines(lines: &[CartLine]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    if lines.len() > MAX_CART_LINES {
        return Err(ValidationError::TooManyLines {
            max: MAX_CART_LINES,
        });
    }

    for line in lines {
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Rules
/// - Must be a valid UUID format
/// - 36 characters with hyphens: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
///
/// ## Example
/// ```rust
/// use meridian_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    // Try to parse as UUID
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: &str, quantity: i64) -> CartLine {
        CartLine {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_validate_sku() {
        // Valid SKUs
        assert!(validate_sku("COLA-330").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("product_1").is_ok());

        // Invalid SKUs
        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Cola 330ml").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_discount_code() {
        assert!(validate_discount_code("SAVE10").is_ok());
        assert!(validate_discount_code("SUMMER_2026").is_ok());
        assert!(validate_discount_code("").is_err());
        assert!(validate_discount_code("HAS SPACE").is_err());
        assert!(validate_discount_code(&"X".repeat(60)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(100).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(matches!(
            validate_quantity(0),
            Err(ValidationError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            validate_quantity(-1),
            Err(ValidationError::InvalidQuantity { quantity: -1 })
        ));
        assert!(matches!(
            validate_quantity(1000),
            Err(ValidationError::QuantityTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_cash_cents() {
        assert!(validate_cash_cents(0).is_ok());
        assert!(validate_cash_cents(5000).is_ok());
        assert!(validate_cash_cents(-1).is_err());
    }

    #[test]
    fn test_validate_stock_delta() {
        assert!(validate_stock_delta(24).is_ok());
        assert!(validate_stock_delta(-3).is_ok());
        assert!(matches!(
            validate_stock_delta(0),
            Err(ValidationError::MustBeNonZero { .. })
        ));
    }

    #[test]
    fn test_validate_cart_lines() {
        assert!(validate_cart_lines(&[line("p1", 2), line("p2", 1)]).is_ok());

        assert!(matches!(
            validate_cart_lines(&[]),
            Err(ValidationError::EmptyCart)
        ));

        let too_many: Vec<CartLine> = (0..101).map(|i| line(&format!("p{i}"), 1)).collect();
        assert!(matches!(
            validate_cart_lines(&too_many),
            Err(ValidationError::TooManyLines { max: 100 })
        ));

        assert!(matches!(
            validate_cart_lines(&[line("p1", 2), line("p2", 0)]),
            Err(ValidationError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[test]
    fn test_duplicate_product_lines_allowed() {
        // Same product twice stays two lines, both valid
        assert!(validate_cart_lines(&[line("p1", 1), line("p1", 3)]).is_ok());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
        assert!(validate_uuid("123").is_err());
    }

    #[test]
    fn test_validate_note() {
        assert!(validate_note("supplier delivery #4411").is_ok());
        assert!(validate_note(&"x".repeat(501)).is_err());
    }
}
