//! # Product Repository
//!
//! Database operations for products, including the guarded stock updates
//! the settlement engine relies on.
//!
//! ## Guarded Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              How Non-Negative Stock Is Enforced                         │
//! │                                                                         │
//! │  Checkout wants qty=3 of product P (stock currently 2)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE products                                                        │
//! │  SET stock = stock - 3                                                  │
//! │  WHERE id = ? AND stock >= 3     ← guard re-checks INSIDE the write    │
//! │       │                                                                 │
//! │       ├── rows_affected = 1 → decrement committed                      │
//! │       └── rows_affected = 0 → insufficient stock, caller rolls back    │
//! │                                                                         │
//! │  The check and the write are one statement, so two concurrent          │
//! │  checkouts of the same product serialize on SQLite's write lock and    │
//! │  the second one sees the first one's decrement. CHECK(stock >= 0)      │
//! │  in the schema backstops any path that forgets the guard.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use meridian_core::Product;

/// Repository for product database operations.
///
/// Reads run against the pool; writes take a `&mut SqliteConnection` so
/// the settlement engine can compose them into one atomic unit.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

const PRODUCT_COLUMNS: &str = "id, sku, name, description, unit_price_cents, stock, \
     branch_id, is_active, created_at, updated_at";

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its ID through an open transaction.
    ///
    /// Used when the caller needs to observe in-transaction state, e.g.
    /// reading the current stock level after a guarded decrement refused.
    pub async fn get_by_id_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// Takes a connection because product registration writes the product
    /// row and its opening-stock ledger entry in one unit.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - SKU already exists
    pub async fn insert(&self, conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, unit_price_cents, stock,
                branch_id, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.stock)
        .bind(&product.branch_id)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Decrements stock by `qty`, refusing to go below zero.
    ///
    /// The guard (`stock >= qty`) and the subtraction are a single UPDATE,
    /// so concurrent decrements of the same product serialize and each one
    /// re-checks against the then-current stock.
    ///
    /// ## Returns
    /// * `Ok(true)` - Stock decremented
    /// * `Ok(false)` - Insufficient stock (or unknown product); nothing changed
    pub async fn decrement_stock(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        qty: i64,
    ) -> DbResult<bool> {
        debug!(id = %id, qty = %qty, "Guarded stock decrement");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            "#,
        )
        .bind(id)
        .bind(qty)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies a signed stock delta, refusing to drive stock negative.
    ///
    /// Positive deltas restock (and always pass the guard); negative deltas
    /// correct, and only pass when enough stock remains.
    ///
    /// ## Returns
    /// * `Ok(true)` - Stock adjusted
    /// * `Ok(false)` - Adjustment would go negative (or unknown product)
    pub async fn adjust_stock(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        delta: i64,
    ) -> DbResult<bool> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1 AND stock + ?2 >= 0
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets the active flag (soft delete / restore).
    ///
    /// ## Why Soft Delete?
    /// Historical transaction items still reference the product row.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<bool> {
        debug!(id = %id, active = %active, "Setting product active flag");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts active products (for diagnostics and the seed tool).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
