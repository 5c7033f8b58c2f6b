//! # Stock Entry Repository
//!
//! Database operations for the append-only stock ledger.
//!
//! ## Ledger Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  • Entries are INSERTed, never UPDATEd or DELETEd                       │
//! │  • Reversal tombstones the entry (reversed = 1) and the engine          │
//! │    applies the inverse delta to the product in the same unit            │
//! │  • mark_reversed guards on reversed = 0, so a double reversal           │
//! │    affects zero rows and the engine can refuse it                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cross-table invariant (entry + product stock move together) is the
//! engine's job; this repository only owns the rows.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use meridian_core::StockEntry;

/// Repository for stock ledger entries.
#[derive(Debug, Clone)]
pub struct StockEntryRepository {
    pool: SqlitePool,
}

const ENTRY_COLUMNS: &str =
    "id, product_id, delta, note, recorded_by, reversed, reversed_at, created_at";

impl StockEntryRepository {
    /// Creates a new StockEntryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockEntryRepository { pool }
    }

    /// Inserts a ledger entry.
    ///
    /// Takes a connection because the matching product stock adjustment
    /// must land in the same transaction.
    pub async fn insert(&self, conn: &mut SqliteConnection, entry: &StockEntry) -> DbResult<()> {
        debug!(product_id = %entry.product_id, delta = %entry.delta, "Inserting stock entry");

        sqlx::query(
            r#"
            INSERT INTO stock_entries (
                id, product_id, delta, note, recorded_by,
                reversed, reversed_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(entry.delta)
        .bind(&entry.note)
        .bind(&entry.recorded_by)
        .bind(entry.reversed)
        .bind(entry.reversed_at)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a ledger entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockEntry>> {
        let entry = sqlx::query_as::<_, StockEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM stock_entries WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Gets a ledger entry by ID through an open transaction.
    pub async fn get_by_id_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<StockEntry>> {
        let entry = sqlx::query_as::<_, StockEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM stock_entries WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(entry)
    }

    /// Lists entries for a product, newest first.
    pub async fn list_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM stock_entries \
             WHERE product_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Tombstones an entry as reversed.
    ///
    /// Guards on `reversed = 0`: reversing twice affects zero rows.
    ///
    /// ## Returns
    /// * `Ok(true)` - Entry marked reversed
    /// * `Ok(false)` - Entry missing or already reversed
    pub async fn mark_reversed(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Marking stock entry reversed");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE stock_entries
            SET reversed = 1, reversed_at = ?2
            WHERE id = ?1 AND reversed = 0
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
