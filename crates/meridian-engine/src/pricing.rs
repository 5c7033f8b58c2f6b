//! # Pricing Engine
//!
//! Computes cart totals and applies discount/promotion rules. Pricing
//! never mutates anything; it reads products and adjustment rows and
//! returns numbers.
//!
//! ## Adjustment Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal = Σ quantity × current_unit_price                             │
//! │                                                                         │
//! │  subtotal ──discount code──▶ reduced ──promotion name──▶ total          │
//! │                                                                         │
//! │  When both are supplied the discount applies first and the              │
//! │  promotion applies to the already-reduced amount. Sequential and        │
//! │  non-commutative:                                                       │
//! │                                                                         │
//! │    10_000 → SAVE10 (10%) → 9_000 → FLAT5 (500 off) → 8_500              │
//! │    10_000 → FLAT5 first would give 8_550                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validity is re-checked on every read: an expired row the sweep has
//! not flipped yet is still rejected.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use meridian_core::validation::{validate_cart_lines, validate_discount_code};
use meridian_core::{CartLine, CoreError, Discount, Money, Product, Promotion};
use meridian_db::Database;

// =============================================================================
// Priced Output
// =============================================================================

/// One cart line with its product resolved and its extension computed.
#[derive(Debug, Clone)]
pub struct PricedLine {
    /// The product as read at pricing time.
    pub product: Product,

    pub quantity: i64,

    /// `quantity × unit_price` at pricing time.
    pub line_total: Money,
}

/// A cart priced against current product data.
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,

    /// Pre-adjustment sum of line totals.
    pub subtotal: Money,
}

/// The outcome of applying optional discount/promotion codes.
#[derive(Debug, Clone)]
pub struct AppliedAdjustments {
    /// Final amount after both adjustments.
    pub total: Money,

    /// Discount row that was applied, if any.
    pub discount_id: Option<String>,

    /// Promotion row that was applied, if any.
    pub promotion_id: Option<String>,
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Read-only pricing over the product and adjustment tables.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    db: Arc<Database>,
}

impl PricingEngine {
    pub fn new(db: Arc<Database>) -> Self {
        PricingEngine { db }
    }

    /// Prices a cart against current products.
    ///
    /// Each `{product_id, quantity}` line resolves its product (missing
    /// or inactive fails `ProductNotFound`) and contributes
    /// `quantity × current_unit_price`. Duplicate product lines stay
    /// separate.
    pub async fn price_cart(&self, lines: &[CartLine]) -> EngineResult<PricedCart> {
        validate_cart_lines(lines)?;

        let mut priced = Vec::with_capacity(lines.len());
        let mut subtotal = Money::zero();

        for line in lines {
            let product = self
                .db
                .products()
                .get_by_id(&line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| EngineError::ProductNotFound {
                    id: line.product_id.clone(),
                })?;

            let line_total = product
                .unit_price()
                .checked_multiply_quantity(line.quantity)
                .ok_or(CoreError::MoneyOverflow)?;
            subtotal = subtotal
                .checked_add(line_total)
                .ok_or(CoreError::MoneyOverflow)?;

            priced.push(PricedLine {
                product,
                quantity: line.quantity,
                line_total,
            });
        }

        debug!(lines = priced.len(), subtotal = %subtotal, "Priced cart");

        Ok(PricedCart {
            lines: priced,
            subtotal,
        })
    }

    /// Loads a discount by code, rejecting missing, inactive, or
    /// out-of-window rows.
    pub async fn resolve_discount(&self, code: &str) -> EngineResult<Discount> {
        validate_discount_code(code)?;

        let discount = self
            .db
            .discounts()
            .find_by_code(code)
            .await?
            .ok_or_else(|| EngineError::InvalidDiscount {
                code: code.to_string(),
            })?;

        if !discount.is_valid_at(Utc::now()) {
            return Err(EngineError::InvalidDiscount {
                code: code.to_string(),
            });
        }

        Ok(discount)
    }

    /// Loads a promotion by name together with the discount rule it
    /// resolves to.
    ///
    /// Validity is judged on the promotion's own window and flag; the
    /// referenced discount only supplies the percentage/fixed rule.
    pub async fn resolve_promotion(&self, name: &str) -> EngineResult<(Promotion, Discount)> {
        let promotion = self
            .db
            .promotions()
            .find_by_name(name)
            .await?
            .ok_or_else(|| EngineError::InvalidPromotion {
                name: name.to_string(),
            })?;

        if !promotion.is_valid_at(Utc::now()) {
            return Err(EngineError::InvalidPromotion {
                name: name.to_string(),
            });
        }

        let discount = self
            .db
            .discounts()
            .get_by_id(&promotion.discount_id)
            .await?
            .ok_or_else(|| EngineError::InvalidPromotion {
                name: name.to_string(),
            })?;

        Ok((promotion, discount))
    }

    /// Applies a discount code to an amount.
    ///
    /// Percentage: subtract the rounded basis-point portion. Fixed:
    /// subtract the value, floored at zero.
    pub async fn apply_discount(&self, code: &str, amount: Money) -> EngineResult<Money> {
        let discount = self.resolve_discount(code).await?;
        Ok(discount.apply(amount))
    }

    /// Applies a promotion (by name) to an amount via its discount rule.
    pub async fn apply_promotion(&self, name: &str, amount: Money) -> EngineResult<Money> {
        let (_, discount) = self.resolve_promotion(name).await?;
        Ok(discount.apply(amount))
    }

    /// Applies optional discount and promotion to an amount, discount
    /// first, and reports which rows were used.
    pub async fn apply_adjustments(
        &self,
        amount: Money,
        discount_code: Option<&str>,
        promotion_name: Option<&str>,
    ) -> EngineResult<AppliedAdjustments> {
        let mut total = amount;
        let mut discount_id = None;
        let mut promotion_id = None;

        if let Some(code) = discount_code {
            let discount = self.resolve_discount(code).await?;
            total = discount.apply(total);
            discount_id = Some(discount.id);
        }

        if let Some(name) = promotion_name {
            let (promotion, discount) = self.resolve_promotion(name).await?;
            total = discount.apply(total);
            promotion_id = Some(promotion.id);
        }

        if total != amount {
            debug!(original = %amount, adjusted = %total, "Applied adjustments");
        }

        Ok(AppliedAdjustments {
            total,
            discount_id,
            promotion_id,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use meridian_core::ValidationError;

    async fn test_db() -> Arc<Database> {
        Arc::new(Database::in_memory().await.unwrap())
    }

    async fn seed_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
        let mut product = Product::new(sku, format!("{sku} test item"), Money::from_cents(price_cents));
        product.stock = stock;

        let mut tx = db.pool().begin().await.unwrap();
        db.products().insert(&mut tx, &product).await.unwrap();
        tx.commit().await.unwrap();

        product
    }

    fn window() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::hours(1), now + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_price_cart_accumulates_line_totals() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let a = seed_product(&db, "SKU-A", 1700, 10).await;
        let b = seed_product(&db, "SKU-B", 250, 10).await;

        let cart = pricing
            .price_cart(&[
                CartLine { product_id: a.id.clone(), quantity: 2 },
                CartLine { product_id: b.id.clone(), quantity: 4 },
            ])
            .await
            .unwrap();

        assert_eq!(cart.subtotal.cents(), 2 * 1700 + 4 * 250);
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].line_total.cents(), 3400);
    }

    #[tokio::test]
    async fn test_price_cart_rejects_missing_product() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let err = pricing
            .price_cart(&[CartLine { product_id: "no-such-id".to_string(), quantity: 1 }])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ProductNotFound { .. }));
    }

    #[tokio::test]
    async fn test_price_cart_rejects_inactive_product() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let product = seed_product(&db, "SKU-OFF", 500, 10).await;
        db.products().set_active(&product.id, false).await.unwrap();

        let err = pricing
            .price_cart(&[CartLine { product_id: product.id.clone(), quantity: 1 }])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ProductNotFound { .. }));
    }

    #[tokio::test]
    async fn test_price_cart_rejects_empty_cart() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let err = pricing.price_cart(&[]).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_apply_discount_percentage() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let (starts, ends) = window();
        db.discounts()
            .insert(&Discount::percentage("SAVE10", 1000, starts, ends))
            .await
            .unwrap();

        let total = pricing
            .apply_discount("SAVE10", Money::from_cents(10_000))
            .await
            .unwrap();
        assert_eq!(total.cents(), 9_000);
    }

    #[tokio::test]
    async fn test_apply_discount_fixed() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let (starts, ends) = window();
        db.discounts()
            .insert(&Discount::fixed("FLAT5", Money::from_cents(500), starts, ends))
            .await
            .unwrap();

        let total = pricing
            .apply_discount("FLAT5", Money::from_cents(2_000))
            .await
            .unwrap();
        assert_eq!(total.cents(), 1_500);
    }

    #[tokio::test]
    async fn test_apply_discount_fixed_floors_at_zero() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let (starts, ends) = window();
        db.discounts()
            .insert(&Discount::fixed("BIG", Money::from_cents(5_000), starts, ends))
            .await
            .unwrap();

        let total = pricing
            .apply_discount("BIG", Money::from_cents(2_000))
            .await
            .unwrap();
        assert_eq!(total.cents(), 0);
    }

    #[tokio::test]
    async fn test_apply_discount_unknown_code() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let err = pricing
            .apply_discount("NOPE", Money::from_cents(1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDiscount { .. }));
    }

    #[tokio::test]
    async fn test_apply_discount_expired_window() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let now = Utc::now();
        db.discounts()
            .insert(&Discount::percentage(
                "OLD10",
                1000,
                now - Duration::days(10),
                now - Duration::days(1),
            ))
            .await
            .unwrap();

        // Still in the table and still flagged active; rejected on read.
        let err = pricing
            .apply_discount("OLD10", Money::from_cents(1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDiscount { .. }));
    }

    #[tokio::test]
    async fn test_apply_promotion_resolves_its_discount() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let (starts, ends) = window();
        let discount = Discount::percentage("SAVE10", 1000, starts, ends);
        db.discounts().insert(&discount).await.unwrap();
        db.promotions()
            .insert(&Promotion::new("Snack Week", &discount.id, starts, ends))
            .await
            .unwrap();

        let total = pricing
            .apply_promotion("Snack Week", Money::from_cents(4_000))
            .await
            .unwrap();
        assert_eq!(total.cents(), 3_600);
    }

    #[tokio::test]
    async fn test_promotion_discounts_whole_total_not_attached_lines() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let snack = seed_product(&db, "SNK-001", 350, 10).await;
        let bread = seed_product(&db, "GRO-005", 340, 10).await;

        let (starts, ends) = window();
        let discount = Discount::percentage("SAVE10", 1000, starts, ends);
        db.discounts().insert(&discount).await.unwrap();
        let promo = Promotion::new("Snack Week", &discount.id, starts, ends);
        db.promotions().insert(&promo).await.unwrap();
        db.promotions().add_product(&promo.id, &snack.id).await.unwrap();

        let eligible = db.promotions().eligible_product_ids(&promo.id).await.unwrap();
        assert_eq!(eligible, vec![snack.id.clone()]);

        // The attached set is bookkeeping; the adjustment still takes 10%
        // off the whole total even for a cart with no attached product.
        let cart = pricing
            .price_cart(&[CartLine { product_id: bread.id.clone(), quantity: 5 }])
            .await
            .unwrap();
        let total = pricing
            .apply_promotion("Snack Week", cart.subtotal)
            .await
            .unwrap();
        assert_eq!(total.cents(), 1_530);
    }

    #[tokio::test]
    async fn test_apply_promotion_expired_window() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let now = Utc::now();
        let (starts, ends) = window();
        let discount = Discount::percentage("SAVE10", 1000, starts, ends);
        db.discounts().insert(&discount).await.unwrap();
        db.promotions()
            .insert(&Promotion::new(
                "Last Month",
                &discount.id,
                now - Duration::days(40),
                now - Duration::days(10),
            ))
            .await
            .unwrap();

        let err = pricing
            .apply_promotion("Last Month", Money::from_cents(4_000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPromotion { .. }));
    }

    #[tokio::test]
    async fn test_adjustments_apply_discount_before_promotion() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let (starts, ends) = window();
        let save10 = Discount::percentage("SAVE10", 1000, starts, ends);
        let flat5 = Discount::fixed("FLAT5", Money::from_cents(500), starts, ends);
        db.discounts().insert(&save10).await.unwrap();
        db.discounts().insert(&flat5).await.unwrap();
        db.promotions()
            .insert(&Promotion::new("Flat Promo", &flat5.id, starts, ends))
            .await
            .unwrap();

        let applied = pricing
            .apply_adjustments(
                Money::from_cents(10_000),
                Some("SAVE10"),
                Some("Flat Promo"),
            )
            .await
            .unwrap();

        // 10_000 → 10% off → 9_000 → 500 off → 8_500.
        // Promotion-first would give 8_550.
        assert_eq!(applied.total.cents(), 8_500);
        assert_eq!(applied.discount_id.as_deref(), Some(save10.id.as_str()));
        assert!(applied.promotion_id.is_some());
    }

    #[tokio::test]
    async fn test_adjustments_without_codes_is_identity() {
        let db = test_db().await;
        let pricing = PricingEngine::new(Arc::clone(&db));

        let applied = pricing
            .apply_adjustments(Money::from_cents(7_500), None, None)
            .await
            .unwrap();

        assert_eq!(applied.total.cents(), 7_500);
        assert!(applied.discount_id.is_none());
        assert!(applied.promotion_id.is_none());
    }
}
