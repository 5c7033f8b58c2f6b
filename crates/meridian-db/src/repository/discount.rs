//! # Discount & Promotion Repositories
//!
//! Database operations for pricing rules.
//!
//! ## Expiry Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two layers keep expired rules from applying:                           │
//! │                                                                         │
//! │  1. The sweep binary calls deactivate_expired(now) periodically,       │
//! │     flipping is_active = 0 where ends_at < now                          │
//! │  2. The pricing engine re-checks the validity window on every read,     │
//! │     so a rule that expired a second ago is rejected even if the         │
//! │     sweep hasn't run yet                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{Discount, Promotion};

// =============================================================================
// Discounts
// =============================================================================

/// Repository for discount rules.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

const DISCOUNT_COLUMNS: &str =
    "id, code, kind, value, starts_at, ends_at, is_active, created_at, updated_at";

impl DiscountRepository {
    /// Creates a new DiscountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Inserts a discount.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - Code already exists
    pub async fn insert(&self, discount: &Discount) -> DbResult<()> {
        debug!(code = %discount.code, "Inserting discount");

        sqlx::query(
            r#"
            INSERT INTO discounts (
                id, code, kind, value, starts_at, ends_at,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.code)
        .bind(discount.kind)
        .bind(discount.value)
        .bind(discount.starts_at)
        .bind(discount.ends_at)
        .bind(discount.is_active)
        .bind(discount.created_at)
        .bind(discount.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Finds a discount by its checkout code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Discount>> {
        let discount = sqlx::query_as::<_, Discount>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(discount)
    }

    /// Gets a discount by ID (promotions resolve their rule through this).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Discount>> {
        let discount = sqlx::query_as::<_, Discount>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(discount)
    }

    /// Deactivates discounts whose window has closed.
    ///
    /// ## Returns
    /// Number of discounts flipped to inactive.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE discounts
            SET is_active = 0, updated_at = ?1
            WHERE is_active = 1 AND ends_at < ?1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(count = result.rows_affected(), "Deactivated expired discounts");
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Promotions
// =============================================================================

/// Repository for promotions and their eligible-product sets.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

const PROMOTION_COLUMNS: &str =
    "id, name, description, discount_id, starts_at, ends_at, is_active, created_at, updated_at";

impl PromotionRepository {
    /// Creates a new PromotionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Inserts a promotion.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - Name already exists
    /// * `DbError::ForeignKeyViolation` - Unknown discount_id
    pub async fn insert(&self, promotion: &Promotion) -> DbResult<()> {
        debug!(name = %promotion.name, "Inserting promotion");

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, name, description, discount_id, starts_at, ends_at,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&promotion.id)
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(&promotion.discount_id)
        .bind(promotion.starts_at)
        .bind(promotion.ends_at)
        .bind(promotion.is_active)
        .bind(promotion.created_at)
        .bind(promotion.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Finds a promotion by its unique name.
    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<Promotion>> {
        let promotion = sqlx::query_as::<_, Promotion>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE name = ?1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promotion)
    }

    /// Adds a product to a promotion's eligible set.
    ///
    /// Idempotent: re-adding an existing pair is a no-op.
    pub async fn add_product(&self, promotion_id: &str, product_id: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO promotion_products (promotion_id, product_id)
            VALUES (?1, ?2)
            "#,
        )
        .bind(promotion_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists the product IDs eligible for a promotion.
    ///
    /// An empty set means the promotion is storewide.
    pub async fn eligible_product_ids(&self, promotion_id: &str) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT product_id FROM promotion_products WHERE promotion_id = ?1 ORDER BY product_id",
        )
        .bind(promotion_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Deactivates promotions whose window has closed.
    ///
    /// ## Returns
    /// Number of promotions flipped to inactive.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE promotions
            SET is_active = 0, updated_at = ?1
            WHERE is_active = 1 AND ends_at < ?1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(count = result.rows_affected(), "Deactivated expired promotions");
        Ok(result.rows_affected())
    }
}
