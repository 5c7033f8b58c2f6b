//! # Transaction Builder
//!
//! Turns a cart into a committed transaction: header, line items, and
//! stock decrements land in one database transaction or not at all.
//!
//! ## Commit Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    for each cart line:                                                  │
//! │      1. load product        (missing/inactive rejects the whole cart)   │
//! │      2. decrement stock     (guarded; short stock rejects the cart)     │
//! │      3. snapshot prices     (item rows copy sku/name/price as of now)   │
//! │    4. insert header         (totals already final)                      │
//! │    5. insert item rows                                                  │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failure before COMMIT rolls everything back: no header, no         │
//! │  items, no stock movement.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Settlement runs the same build inside its own transaction so the
//! payment row joins the same atomic unit.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::audit::{record_detached, AuditSink};
use crate::error::{EngineError, EngineResult};
use crate::stock::StockLedger;
use meridian_core::validation::validate_cart_lines;
use meridian_core::{
    CartLine, CoreError, Money, Payment, Transaction, TransactionItem, TransactionStatus,
    ValidationError,
};
use meridian_db::Database;

/// Everything needed to commit a transaction.
///
/// `status` defaults to `Settled`; split flows create `Pending` headers
/// and settle them when the card leg confirms. `explicit_total` carries
/// a discounted total; when absent the total equals the subtotal.
#[derive(Debug, Clone)]
pub struct CreateTransactionRequest {
    pub lines: Vec<CartLine>,
    pub status: TransactionStatus,
    pub explicit_total: Option<Money>,
    pub customer_id: Option<String>,
    pub discount_id: Option<String>,
    pub promotion_id: Option<String>,
    pub created_by: Option<String>,
}

impl CreateTransactionRequest {
    pub fn new(lines: Vec<CartLine>) -> Self {
        CreateTransactionRequest {
            lines,
            status: TransactionStatus::Settled,
            explicit_total: None,
            customer_id: None,
            discount_id: None,
            promotion_id: None,
            created_by: None,
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_explicit_total(mut self, total: Money) -> Self {
        self.explicit_total = Some(total);
        self
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_discount(mut self, discount_id: impl Into<String>) -> Self {
        self.discount_id = Some(discount_id.into());
        self
    }

    pub fn with_promotion(mut self, promotion_id: impl Into<String>) -> Self {
        self.promotion_id = Some(promotion_id.into());
        self
    }

    pub fn with_creator(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }
}

/// A transaction as committed, with its item rows.
#[derive(Debug, Clone, Serialize)]
pub struct CommittedTransaction {
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
}

/// Full read model: header, items, and the payment if one exists.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
    pub payment: Option<Payment>,
}

/// Builds and voids transactions.
#[derive(Clone)]
pub struct TransactionBuilder {
    db: Arc<Database>,
    stock: StockLedger,
    audit: Arc<dyn AuditSink>,
}

impl TransactionBuilder {
    pub fn new(db: Arc<Database>, audit: Arc<dyn AuditSink>) -> Self {
        let stock = StockLedger::new(Arc::clone(&db), Arc::clone(&audit));
        TransactionBuilder { db, stock, audit }
    }

    /// Commits a transaction in its own database transaction.
    pub async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> EngineResult<CommittedTransaction> {
        let mut tx = self.db.pool().begin().await?;
        let committed = self.build_in_tx(&mut tx, &request).await?;
        tx.commit().await?;

        info!(
            transaction_id = %committed.transaction.id,
            total_cents = committed.transaction.total_cents,
            items = committed.items.len(),
            "Committed transaction"
        );
        record_detached(
            &self.audit,
            meridian_core::AuditEntry::new(
                "transaction.create",
                committed.transaction.created_by.clone(),
                "transaction",
                Some(committed.transaction.id.clone()),
                Some(
                    json!({
                        "total_cents": committed.transaction.total_cents,
                        "items": committed.items.len(),
                    })
                    .to_string(),
                ),
            ),
        );

        Ok(committed)
    }

    /// Builds header, items, and stock decrements on the caller's open
    /// transaction. Settlement flows call this so the payment row
    /// commits atomically with the sale.
    pub(crate) async fn build_in_tx(
        &self,
        conn: &mut SqliteConnection,
        request: &CreateTransactionRequest,
    ) -> EngineResult<CommittedTransaction> {
        validate_cart_lines(&request.lines)?;
        if let Some(total) = request.explicit_total {
            if total.is_negative() {
                return Err(ValidationError::OutOfRange {
                    field: "total_cents".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into());
            }
        }

        let mut txn = Transaction::new(request.status);
        txn.customer_id = request.customer_id.clone();
        txn.discount_id = request.discount_id.clone();
        txn.promotion_id = request.promotion_id.clone();
        txn.created_by = request.created_by.clone();

        let mut subtotal = Money::zero();
        let mut items = Vec::with_capacity(request.lines.len());

        for line in &request.lines {
            let product = self
                .db
                .products()
                .get_by_id_tx(&mut *conn, &line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| EngineError::ProductNotFound {
                    id: line.product_id.clone(),
                })?;

            self.stock
                .decrement(&mut *conn, &line.product_id, line.quantity)
                .await?;

            let line_total = product
                .unit_price()
                .checked_multiply_quantity(line.quantity)
                .ok_or(CoreError::MoneyOverflow)?;
            subtotal = subtotal
                .checked_add(line_total)
                .ok_or(CoreError::MoneyOverflow)?;

            items.push(TransactionItem::from_product(
                &txn.id,
                &product,
                line.quantity,
            ));
        }

        txn.subtotal_cents = subtotal.cents();
        txn.total_cents = request.explicit_total.unwrap_or(subtotal).cents();

        self.db.transactions().insert_header(&mut *conn, &txn).await?;
        for item in &items {
            self.db.transactions().insert_item(&mut *conn, item).await?;
        }

        debug!(transaction_id = %txn.id, items = items.len(), "Built transaction rows");
        Ok(CommittedTransaction {
            transaction: txn,
            items,
        })
    }

    /// Voids a transaction and restores the stock its items consumed.
    ///
    /// Already-voided transactions reject. Payment rows are left in
    /// place for the books; a refund is a gateway-side concern.
    pub async fn void_transaction(
        &self,
        id: &str,
        actor: Option<String>,
    ) -> EngineResult<Transaction> {
        let mut tx = self.db.pool().begin().await?;

        let mut txn = self
            .db
            .transactions()
            .get_by_id_tx(&mut tx, id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound { id: id.to_string() })?;

        if txn.status == TransactionStatus::Voided {
            return Err(EngineError::invariant(format!(
                "transaction {} is already voided",
                txn.id
            )));
        }

        let items = self.db.transactions().items_for_tx(&mut tx, id).await?;
        for item in &items {
            let adjusted = self
                .db
                .products()
                .adjust_stock(&mut tx, &item.product_id, item.quantity)
                .await?;
            if !adjusted {
                return Err(EngineError::invariant(format!(
                    "could not restore {} units of product {} while voiding {}",
                    item.quantity, item.product_id, txn.id
                )));
            }
        }

        let marked = self.db.transactions().mark_voided(&mut tx, id).await?;
        if !marked {
            return Err(EngineError::invariant(format!(
                "transaction {} changed state while voiding",
                txn.id
            )));
        }

        tx.commit().await?;

        txn.status = TransactionStatus::Voided;
        txn.updated_at = Utc::now();

        info!(transaction_id = %txn.id, restored_items = items.len(), "Voided transaction");
        record_detached(
            &self.audit,
            meridian_core::AuditEntry::new(
                "transaction.void",
                actor,
                "transaction",
                Some(txn.id.clone()),
                Some(json!({ "restored_items": items.len() }).to_string()),
            ),
        );

        Ok(txn)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Loads a transaction with its items and payment.
    pub async fn get_transaction(&self, id: &str) -> EngineResult<TransactionDetail> {
        let transaction = self
            .db
            .transactions()
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound { id: id.to_string() })?;
        let items = self.db.transactions().items_for(id).await?;
        let payment = self.db.transactions().payment_for_transaction(id).await?;

        Ok(TransactionDetail {
            transaction,
            items,
            payment,
        })
    }

    /// Lists recent transactions, newest first.
    pub async fn list_transactions(&self, limit: u32) -> EngineResult<Vec<Transaction>> {
        Ok(self.db.transactions().list_recent(limit).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
