//! # Stock Ledger
//!
//! Owns product stock. Sales decrement through [`StockLedger::decrement`]
//! inside the checkout transaction; every other movement (restock,
//! correction, opening stock) is an explicit ledger entry applied and
//! reversed atomically.
//!
//! ## Non-Negative Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Three layers keep stock ≥ 0:                                           │
//! │                                                                         │
//! │  1. Guarded UPDATE      stock = stock - ?  WHERE stock >= ?             │
//! │                         zero rows affected = rejected, re-read to       │
//! │                         report requested vs available                   │
//! │  2. Single writer       SQLite serializes writers, so two checkouts     │
//! │                         of the same product cannot interleave           │
//! │                         between read and write                          │
//! │  3. CHECK constraint    CHECK (stock >= 0) backstops any future         │
//! │                         query that forgets the guard                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::audit::{record_detached, AuditSink};
use crate::error::{EngineError, EngineResult};
use meridian_core::validation::{
    validate_note, validate_price_cents, validate_product_name, validate_quantity, validate_sku,
    validate_stock_delta,
};
use meridian_core::{Money, NewProduct, Product, StockEntry, ValidationError};
use meridian_db::Database;

/// Stock mutations and the append-only movement ledger.
#[derive(Clone)]
pub struct StockLedger {
    db: Arc<Database>,
    audit: Arc<dyn AuditSink>,
}

impl StockLedger {
    pub fn new(db: Arc<Database>, audit: Arc<dyn AuditSink>) -> Self {
        StockLedger { db, audit }
    }

    // =========================================================================
    // Checkout-side decrement
    // =========================================================================

    /// Decrements stock inside the caller's open transaction.
    ///
    /// The guarded update re-checks stock at write time, so a concurrent
    /// sale that got there first is seen. Zero rows affected means
    /// either the product is gone or the stock is short; the re-read
    /// tells the two apart and reports current availability.
    pub async fn decrement(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> EngineResult<()> {
        validate_quantity(quantity)?;

        if self
            .db
            .products()
            .decrement_stock(conn, product_id, quantity)
            .await?
        {
            return Ok(());
        }

        let product = self
            .db
            .products()
            .get_by_id_tx(conn, product_id)
            .await?
            .ok_or_else(|| EngineError::ProductNotFound {
                id: product_id.to_string(),
            })?;

        Err(EngineError::InsufficientStock {
            sku: product.sku,
            requested: quantity,
            available: product.stock,
        })
    }

    // =========================================================================
    // Product registration
    // =========================================================================

    /// Creates a product, recording opening stock as a ledger entry in
    /// the same transaction when it is non-zero.
    pub async fn register_product(
        &self,
        new: NewProduct,
        actor: Option<String>,
    ) -> EngineResult<Product> {
        validate_sku(&new.sku)?;
        validate_product_name(&new.name)?;
        validate_price_cents(new.unit_price_cents)?;
        if new.opening_stock < 0 {
            return Err(ValidationError::OutOfRange {
                field: "opening_stock".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        let mut product = Product::new(
            new.sku.trim(),
            new.name.trim(),
            Money::from_cents(new.unit_price_cents),
        );
        product.description = new.description;
        product.stock = new.opening_stock;
        if let Some(branch) = new.branch_id {
            product.branch_id = branch;
        }

        let mut tx = self.db.pool().begin().await?;

        self.db.products().insert(&mut tx, &product).await?;

        if new.opening_stock > 0 {
            let entry = StockEntry::new(
                &product.id,
                new.opening_stock,
                Some("opening stock".to_string()),
                actor.clone(),
            );
            self.db.stock_entries().insert(&mut tx, &entry).await?;
        }

        tx.commit().await?;

        info!(sku = %product.sku, stock = product.stock, "Registered product");
        record_detached(
            &self.audit,
            meridian_core::AuditEntry::new(
                "product.register",
                actor,
                "product",
                Some(product.id.clone()),
                Some(json!({ "sku": product.sku, "opening_stock": product.stock }).to_string()),
            ),
        );

        Ok(product)
    }

    // =========================================================================
    // Ledger entries
    // =========================================================================

    /// Applies a stock movement: persists the entry and the adjustment
    /// as one unit.
    ///
    /// A negative delta that would drive stock below zero fails
    /// `InvariantViolation` with nothing persisted.
    pub async fn apply_entry(
        &self,
        product_id: &str,
        delta: i64,
        note: Option<String>,
        actor: Option<String>,
    ) -> EngineResult<StockEntry> {
        validate_stock_delta(delta)?;
        if let Some(n) = &note {
            validate_note(n)?;
        }

        let mut tx = self.db.pool().begin().await?;

        let product = self
            .db
            .products()
            .get_by_id_tx(&mut tx, product_id)
            .await?
            .ok_or_else(|| EngineError::ProductNotFound {
                id: product_id.to_string(),
            })?;

        let adjusted = self
            .db
            .products()
            .adjust_stock(&mut tx, product_id, delta)
            .await?;
        if !adjusted {
            return Err(EngineError::invariant(format!(
                "correction of {} would drive {} below zero (stock {})",
                delta, product.sku, product.stock
            )));
        }

        let entry = StockEntry::new(product_id, delta, note, actor);
        self.db.stock_entries().insert(&mut tx, &entry).await?;

        tx.commit().await?;

        debug!(sku = %product.sku, delta, "Applied stock entry");
        record_detached(
            &self.audit,
            meridian_core::AuditEntry::new(
                "stock.apply",
                entry.recorded_by.clone(),
                "stock_entry",
                Some(entry.id.clone()),
                Some(json!({ "product_id": product_id, "delta": delta }).to_string()),
            ),
        );

        Ok(entry)
    }

    /// Reverses a ledger entry: applies the inverse delta, re-validates
    /// non-negativity, and marks the entry reversed, atomically.
    ///
    /// The ledger is append-only; reversal is a tombstone, never a
    /// deletion.
    pub async fn reverse_entry(
        &self,
        entry_id: &str,
        actor: Option<String>,
    ) -> EngineResult<StockEntry> {
        let mut tx = self.db.pool().begin().await?;

        let mut entry = self
            .db
            .stock_entries()
            .get_by_id_tx(&mut tx, entry_id)
            .await?
            .ok_or_else(|| EngineError::StockEntryNotFound {
                id: entry_id.to_string(),
            })?;

        if entry.reversed {
            return Err(EngineError::invariant(format!(
                "stock entry {} is already reversed",
                entry.id
            )));
        }

        let inverse = -entry.delta;
        let adjusted = self
            .db
            .products()
            .adjust_stock(&mut tx, &entry.product_id, inverse)
            .await?;
        if !adjusted {
            return Err(EngineError::invariant(format!(
                "reversing entry {} (delta {}) would drive stock below zero",
                entry.id, entry.delta
            )));
        }

        let marked = self
            .db
            .stock_entries()
            .mark_reversed(&mut tx, &entry.id)
            .await?;
        if !marked {
            return Err(EngineError::invariant(format!(
                "stock entry {} is already reversed",
                entry.id
            )));
        }

        tx.commit().await?;

        entry.reversed = true;
        entry.reversed_at = Some(chrono::Utc::now());

        debug!(entry_id = %entry.id, inverse, "Reversed stock entry");
        record_detached(
            &self.audit,
            meridian_core::AuditEntry::new(
                "stock.reverse",
                actor,
                "stock_entry",
                Some(entry.id.clone()),
                Some(json!({ "product_id": entry.product_id, "inverse_delta": inverse }).to_string()),
            ),
        );

        Ok(entry)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a product by id.
    pub async fn get_product(&self, id: &str) -> EngineResult<Product> {
        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::ProductNotFound { id: id.to_string() })
    }

    /// Lists active products.
    pub async fn list_products(&self, limit: u32) -> EngineResult<Vec<Product>> {
        Ok(self.db.products().list_active(limit).await?)
    }

    /// Lists ledger entries for a product, newest first.
    pub async fn entries_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> EngineResult<Vec<StockEntry>> {
        // Missing product answers 404, not an empty list.
        self.get_product(product_id).await?;
        Ok(self
            .db
            .stock_entries()
            .list_for_product(product_id, limit)
            .await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
