//! # Transaction Repository
//!
//! Database operations for transaction headers, line items, and payments.
//!
//! ## Settlement Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │               One Atomic Unit per Settlement                            │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    insert_header(txn)                                                   │
//! │    for each line:                                                       │
//! │      products.decrement_stock(...)   ← guarded                          │
//! │      insert_item(item)               ← frozen snapshot                  │
//! │    insert_payment(payment)           ← cash/card leg                    │
//! │  COMMIT        (or ROLLBACK, after which none of the above exists)      │
//! │                                                                         │
//! │  Confirming a split updates the SAME payment row:                       │
//! │    update_payment_card_leg(...)  +  mark_settled(...)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payments are keyed UNIQUE on transaction_id (one payment per
//! transaction) and UNIQUE on gateway_intent_id (one settlement per
//! intent, which backstops idempotent confirms).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{Payment, Transaction, TransactionItem};

/// Repository for transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

const TXN_COLUMNS: &str = "id, status, subtotal_cents, total_cents, customer_id, \
     discount_id, promotion_id, created_by, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, transaction_id, product_id, sku, name, quantity, \
     unit_price_cents, line_total_cents, created_at";

const PAYMENT_COLUMNS: &str = "id, transaction_id, method, cash_cents, card_cents, \
     change_cents, gateway_intent_id, gateway_status, created_at, updated_at";

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    // =========================================================================
    // Headers
    // =========================================================================

    /// Inserts a transaction header.
    pub async fn insert_header(
        &self,
        conn: &mut SqliteConnection,
        txn: &Transaction,
    ) -> DbResult<()> {
        debug!(id = %txn.id, status = ?txn.status, "Inserting transaction header");

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, status, subtotal_cents, total_cents, customer_id,
                discount_id, promotion_id, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&txn.id)
        .bind(txn.status)
        .bind(txn.subtotal_cents)
        .bind(txn.total_cents)
        .bind(&txn.customer_id)
        .bind(&txn.discount_id)
        .bind(&txn.promotion_id)
        .bind(&txn.created_by)
        .bind(txn.created_at)
        .bind(txn.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a transaction by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let txn = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(txn)
    }

    /// Gets a transaction by ID through an open transaction.
    pub async fn get_by_id_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Transaction>> {
        let txn = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(txn)
    }

    /// Lists transactions, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Transaction>> {
        let txns = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(txns)
    }

    /// Marks a pending transaction settled.
    ///
    /// Guards on `status = 'pending'`: settling twice affects zero rows, so
    /// a duplicate confirm can detect it was beaten and stay idempotent.
    pub async fn mark_settled(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'settled', updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks a transaction voided.
    ///
    /// Only pending or settled transactions can be voided; voiding twice
    /// affects zero rows.
    pub async fn mark_voided(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'voided', updated_at = ?2
            WHERE id = ?1 AND status IN ('pending', 'settled')
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Line Items
    // =========================================================================

    /// Inserts a line item.
    ///
    /// ## Snapshot Pattern
    /// The item carries sku/name/price copied at sale time; this INSERT is
    /// the moment the snapshot freezes.
    pub async fn insert_item(
        &self,
        conn: &mut SqliteConnection,
        item: &TransactionItem,
    ) -> DbResult<()> {
        debug!(
            transaction_id = %item.transaction_id,
            product_id = %item.product_id,
            quantity = %item.quantity,
            "Inserting transaction item"
        );

        sqlx::query(
            r#"
            INSERT INTO transaction_items (
                id, transaction_id, product_id, sku, name,
                quantity, unit_price_cents, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.transaction_id)
        .bind(&item.product_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets all items for a transaction.
    pub async fn items_for(&self, transaction_id: &str) -> DbResult<Vec<TransactionItem>> {
        let items = sqlx::query_as::<_, TransactionItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM transaction_items \
             WHERE transaction_id = ?1 ORDER BY created_at"
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets all items for a transaction through an open transaction.
    ///
    /// The void flow restores stock per item inside its own atomic unit.
    pub async fn items_for_tx(
        &self,
        conn: &mut SqliteConnection,
        transaction_id: &str,
    ) -> DbResult<Vec<TransactionItem>> {
        let items = sqlx::query_as::<_, TransactionItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM transaction_items \
             WHERE transaction_id = ?1 ORDER BY created_at"
        ))
        .bind(transaction_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Inserts a payment row.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - A payment already exists for this
    ///   transaction, or another payment already references this gateway
    ///   intent (idempotency race; the caller re-reads and returns the
    ///   existing settlement)
    pub async fn insert_payment(
        &self,
        conn: &mut SqliteConnection,
        payment: &Payment,
    ) -> DbResult<()> {
        debug!(
            transaction_id = %payment.transaction_id,
            method = ?payment.method,
            "Inserting payment"
        );

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, transaction_id, method, cash_cents, card_cents, change_cents,
                gateway_intent_id, gateway_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.transaction_id)
        .bind(payment.method)
        .bind(payment.cash_cents)
        .bind(payment.card_cents)
        .bind(payment.change_cents)
        .bind(&payment.gateway_intent_id)
        .bind(&payment.gateway_status)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets the payment for a transaction, if one exists.
    pub async fn payment_for_transaction(&self, transaction_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = ?1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Gets the payment for a transaction through an open transaction.
    pub async fn payment_for_transaction_tx(
        &self,
        conn: &mut SqliteConnection,
        transaction_id: &str,
    ) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = ?1"
        ))
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(payment)
    }

    /// Finds the payment that settled a given gateway intent.
    ///
    /// This is the idempotency lookup for card confirms: if a payment
    /// already references the intent, the confirm already happened.
    pub async fn payment_by_intent(&self, intent_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_intent_id = ?1"
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Records the card leg on an existing payment row (split confirm).
    ///
    /// The row is updated in place; a split never grows a second payment.
    ///
    /// ## Returns
    /// * `Ok(true)` - Card leg recorded
    /// * `Ok(false)` - No such payment row
    pub async fn update_payment_card_leg(
        &self,
        conn: &mut SqliteConnection,
        payment_id: &str,
        card_cents: i64,
        gateway_intent_id: &str,
        gateway_status: &str,
    ) -> DbResult<bool> {
        debug!(payment_id = %payment_id, card_cents = %card_cents, "Recording card leg");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET card_cents = ?2, gateway_intent_id = ?3, gateway_status = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(payment_id)
        .bind(card_cents)
        .bind(gateway_intent_id)
        .bind(gateway_status)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
