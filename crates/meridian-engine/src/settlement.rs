//! # Payment Settlement
//!
//! The tender flows. Each flow prices the cart server-side, applies
//! adjustments, and commits the sale and its payment as one unit.
//!
//! ## Tender Flows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CASH      pay_cash                                                     │
//! │            price → check tender → [txn + items + stock + payment]       │
//! │            one commit, change returned                                  │
//! │                                                                         │
//! │  CARD      create_card_intent          confirm_card                     │
//! │            price → gateway intent      verify succeeded → [txn + ...]   │
//! │            (no rows written)           rows exist only after the        │
//! │                                        gateway says the money moved     │
//! │                                                                         │
//! │  SPLIT     pay_split                   confirm_split                    │
//! │            price → [pending txn +      verify succeeded → card leg      │
//! │            cash leg] → intent for      onto the SAME payment row,       │
//! │            the remainder               txn flips pending → settled      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Idempotent Confirms
//! A confirm can arrive twice: client retry, double tap, redelivered
//! webhook. `confirm_card` checks the intent reference before touching
//! the gateway and returns the prior settlement; the UNIQUE index on
//! `payments.gateway_intent_id` backstops the race where two confirms
//! pass the check together. `confirm_split` short-circuits on an
//! already-settled card leg.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::{record_detached, AuditSink};
use crate::checkout::{CreateTransactionRequest, TransactionBuilder};
use crate::error::{EngineError, EngineResult};
use crate::gateway::{intent_id_from_client_secret, PaymentGateway};
use crate::pricing::PricingEngine;
use meridian_core::validation::validate_cash_cents;
use meridian_core::{
    AuditEntry, CartLine, Money, Payment, TransactionStatus, GATEWAY_STATUS_SUCCEEDED,
};
use meridian_db::Database;

/// Currency sent to the gateway unless overridden.
pub const DEFAULT_CURRENCY: &str = "cad";

// =============================================================================
// Requests and receipts
// =============================================================================

/// A cash sale: the cart plus the bills handed over.
#[derive(Debug, Clone, Deserialize)]
pub struct CashPaymentRequest {
    pub items: Vec<CartLine>,
    pub tendered_cash_cents: i64,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub promotion_name: Option<String>,
    #[serde(default)]
    pub cashier: Option<String>,
}

/// What the cashier reads back after a cash sale.
#[derive(Debug, Clone, Serialize)]
pub struct CashReceipt {
    pub transaction_id: String,
    pub total_cents: i64,
    pub tendered_cents: i64,
    /// Change owed back to the customer.
    pub balance_cents: i64,
}

/// A card sale's first half: price the cart, open an intent.
#[derive(Debug, Clone, Deserialize)]
pub struct CardIntentRequest {
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub promotion_name: Option<String>,
}

/// The open intent, ready for the payment UI.
#[derive(Debug, Clone, Serialize)]
pub struct CardIntent {
    pub client_secret: String,
    pub intent_id: String,
    pub amount_cents: i64,
}

/// A card sale's second half: the cart again, plus the client secret
/// the UI finished with.
#[derive(Debug, Clone, Deserialize)]
pub struct CardConfirmRequest {
    pub client_secret: String,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub cashier: Option<String>,
}

/// Where a settlement landed.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub transaction_id: String,
    pub status: TransactionStatus,
}

/// A split sale: part cash now, the rest by card.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitPaymentRequest {
    pub items: Vec<CartLine>,
    pub cash_amount_cents: i64,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub promotion_name: Option<String>,
    #[serde(default)]
    pub cashier: Option<String>,
}

/// The split as initiated. `client_secret` is absent when cash covered
/// the whole total and the sale settled immediately.
#[derive(Debug, Clone, Serialize)]
pub struct SplitInitiation {
    pub transaction_id: String,
    pub total_cents: i64,
    pub cash_cents: i64,
    pub remaining_balance_cents: i64,
    pub client_secret: Option<String>,
}

/// Settles the card leg of a previously initiated split.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfirmRequest {
    pub client_secret: String,
    pub transaction_id: String,
}

// =============================================================================
// Settlement service
// =============================================================================

/// Runs the tender flows against the store and the card gateway.
#[derive(Clone)]
pub struct PaymentSettlement {
    db: Arc<Database>,
    pricing: PricingEngine,
    builder: TransactionBuilder,
    gateway: Arc<dyn PaymentGateway>,
    audit: Arc<dyn AuditSink>,
    currency: String,
}

impl PaymentSettlement {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn PaymentGateway>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let pricing = PricingEngine::new(Arc::clone(&db));
        let builder = TransactionBuilder::new(Arc::clone(&db), Arc::clone(&audit));
        PaymentSettlement {
            db,
            pricing,
            builder,
            gateway,
            audit,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Overrides the currency sent to the gateway.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    // =========================================================================
    // Cash
    // =========================================================================

    /// Settles a cash sale in one database transaction.
    ///
    /// Tender below the adjusted total rejects before anything is
    /// written; overpay comes back as change on the receipt.
    pub async fn pay_cash(&self, request: CashPaymentRequest) -> EngineResult<CashReceipt> {
        validate_cash_cents(request.tendered_cash_cents)?;

        let priced = self.pricing.price_cart(&request.items).await?;
        let adjusted = self
            .pricing
            .apply_adjustments(
                priced.subtotal,
                request.discount_code.as_deref(),
                request.promotion_name.as_deref(),
            )
            .await?;

        let tendered = Money::from_cents(request.tendered_cash_cents);
        if tendered < adjusted.total {
            return Err(EngineError::InsufficientTender {
                total: adjusted.total,
                tendered,
            });
        }
        let change = tendered - adjusted.total;

        let mut txn_request = CreateTransactionRequest::new(request.items.clone())
            .with_explicit_total(adjusted.total);
        txn_request.customer_id = request.customer_id.clone();
        txn_request.discount_id = adjusted.discount_id.clone();
        txn_request.promotion_id = adjusted.promotion_id.clone();
        txn_request.created_by = request.cashier.clone();

        let mut tx = self.db.pool().begin().await?;
        let committed = self.builder.build_in_tx(&mut tx, &txn_request).await?;
        let payment = Payment::cash(&committed.transaction.id, tendered, change);
        self.db.transactions().insert_payment(&mut tx, &payment).await?;
        tx.commit().await?;

        info!(
            transaction_id = %committed.transaction.id,
            total = %adjusted.total,
            change = %change,
            "Settled cash payment"
        );
        record_detached(
            &self.audit,
            AuditEntry::new(
                "payment.cash",
                request.cashier,
                "transaction",
                Some(committed.transaction.id.clone()),
                Some(
                    json!({
                        "total_cents": adjusted.total.cents(),
                        "tendered_cents": tendered.cents(),
                        "change_cents": change.cents(),
                    })
                    .to_string(),
                ),
            ),
        );

        Ok(CashReceipt {
            transaction_id: committed.transaction.id,
            total_cents: adjusted.total.cents(),
            tendered_cents: tendered.cents(),
            balance_cents: change.cents(),
        })
    }

    // =========================================================================
    // Card
    // =========================================================================

    /// Prices the cart and opens a gateway intent. Writes nothing; the
    /// sale exists only once [`confirm_card`](Self::confirm_card)
    /// verifies the money moved.
    pub async fn create_card_intent(&self, request: CardIntentRequest) -> EngineResult<CardIntent> {
        let priced = self.pricing.price_cart(&request.items).await?;
        let adjusted = self
            .pricing
            .apply_adjustments(
                priced.subtotal,
                request.discount_code.as_deref(),
                request.promotion_name.as_deref(),
            )
            .await?;

        let intent = self
            .gateway
            .create_intent(adjusted.total.cents(), &self.currency, &[])
            .await?;

        info!(
            intent_id = %intent.intent_id,
            amount_cents = adjusted.total.cents(),
            "Opened card intent"
        );

        Ok(CardIntent {
            client_secret: intent.client_secret,
            intent_id: intent.intent_id,
            amount_cents: adjusted.total.cents(),
        })
    }

    /// Commits a card sale after verifying the intent succeeded.
    ///
    /// The committed header's total is the amount the gateway captured,
    /// so an adjustment applied at intent time carries through to the
    /// sale even though the confirm request carries no codes.
    ///
    /// Replays return the settlement already recorded for the intent
    /// without calling the gateway again. If two confirms for the same
    /// intent race past that check, the unique intent reference lets
    /// exactly one commit; the loser's rows roll back and it returns
    /// the winner's settlement.
    pub async fn confirm_card(&self, request: CardConfirmRequest) -> EngineResult<SettlementOutcome> {
        let intent_id = intent_id_from_client_secret(&request.client_secret).to_string();

        if let Some(existing) = self.db.transactions().payment_by_intent(&intent_id).await? {
            debug!(intent_id = %intent_id, "Card confirm replayed");
            return Ok(SettlementOutcome {
                transaction_id: existing.transaction_id,
                status: TransactionStatus::Settled,
            });
        }

        let status = self.gateway.retrieve_intent(&intent_id).await?;
        if status.status != GATEWAY_STATUS_SUCCEEDED {
            return Err(EngineError::PaymentNotSucceeded {
                status: status.status,
            });
        }

        let mut txn_request = CreateTransactionRequest::new(request.items.clone())
            .with_explicit_total(Money::from_cents(status.amount_received_minor));
        txn_request.customer_id = request.customer_id.clone();
        txn_request.created_by = request.cashier.clone();

        let mut tx = self.db.pool().begin().await?;
        let committed = self.builder.build_in_tx(&mut tx, &txn_request).await?;
        let payment = Payment::card(
            &committed.transaction.id,
            Money::from_cents(status.amount_received_minor),
            &intent_id,
            &status.status,
        );

        match self.db.transactions().insert_payment(&mut tx, &payment).await {
            Ok(()) => tx.commit().await?,
            Err(err) if err.is_unique_violation() => {
                // A racing confirm recorded this intent first. Roll our
                // rows back and answer with the settlement that won.
                drop(tx);
                warn!(intent_id = %intent_id, "Concurrent card confirm lost the race");
                if let Some(existing) =
                    self.db.transactions().payment_by_intent(&intent_id).await?
                {
                    return Ok(SettlementOutcome {
                        transaction_id: existing.transaction_id,
                        status: TransactionStatus::Settled,
                    });
                }
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            transaction_id = %committed.transaction.id,
            intent_id = %intent_id,
            card_cents = status.amount_received_minor,
            "Settled card payment"
        );
        record_detached(
            &self.audit,
            AuditEntry::new(
                "payment.card",
                request.cashier,
                "transaction",
                Some(committed.transaction.id.clone()),
                Some(
                    json!({
                        "intent_id": intent_id,
                        "card_cents": status.amount_received_minor,
                    })
                    .to_string(),
                ),
            ),
        );

        Ok(SettlementOutcome {
            transaction_id: committed.transaction.id,
            status: TransactionStatus::Settled,
        })
    }

    // =========================================================================
    // Split
    // =========================================================================

    /// Initiates a split sale: commits the transaction with its cash
    /// leg, then opens an intent for the remainder.
    ///
    /// Cash above the total rejects (change on a split is not a thing;
    /// tender exact cash or less). Cash equal to the total settles
    /// immediately with no intent. The intent call happens after the
    /// commit, mirroring the cash-first counter flow; if it fails the
    /// pending sale stays on the books for the cashier to void or
    /// retry from a fresh cart.
    pub async fn pay_split(&self, request: SplitPaymentRequest) -> EngineResult<SplitInitiation> {
        validate_cash_cents(request.cash_amount_cents)?;

        let priced = self.pricing.price_cart(&request.items).await?;
        let adjusted = self
            .pricing
            .apply_adjustments(
                priced.subtotal,
                request.discount_code.as_deref(),
                request.promotion_name.as_deref(),
            )
            .await?;

        let cash = Money::from_cents(request.cash_amount_cents);
        if cash > adjusted.total {
            return Err(EngineError::ExcessCashTender {
                total: adjusted.total,
                cash,
            });
        }
        let remaining = adjusted.total - cash;
        let status = if remaining.is_zero() {
            TransactionStatus::Settled
        } else {
            TransactionStatus::Pending
        };

        let mut txn_request = CreateTransactionRequest::new(request.items.clone())
            .with_status(status)
            .with_explicit_total(adjusted.total);
        txn_request.customer_id = request.customer_id.clone();
        txn_request.discount_id = adjusted.discount_id.clone();
        txn_request.promotion_id = adjusted.promotion_id.clone();
        txn_request.created_by = request.cashier.clone();

        let mut tx = self.db.pool().begin().await?;
        let committed = self.builder.build_in_tx(&mut tx, &txn_request).await?;
        if cash.is_positive() {
            let payment = Payment::split_cash(&committed.transaction.id, cash);
            self.db.transactions().insert_payment(&mut tx, &payment).await?;
        }
        tx.commit().await?;

        let client_secret = if remaining.is_positive() {
            let intent = self
                .gateway
                .create_intent(
                    remaining.cents(),
                    &self.currency,
                    &[("transaction_id", committed.transaction.id.as_str())],
                )
                .await?;
            Some(intent.client_secret)
        } else {
            None
        };

        info!(
            transaction_id = %committed.transaction.id,
            total = %adjusted.total,
            cash = %cash,
            remaining = %remaining,
            "Initiated split payment"
        );
        record_detached(
            &self.audit,
            AuditEntry::new(
                "payment.split",
                request.cashier,
                "transaction",
                Some(committed.transaction.id.clone()),
                Some(
                    json!({
                        "total_cents": adjusted.total.cents(),
                        "cash_cents": cash.cents(),
                        "remaining_cents": remaining.cents(),
                    })
                    .to_string(),
                ),
            ),
        );

        Ok(SplitInitiation {
            transaction_id: committed.transaction.id,
            total_cents: adjusted.total.cents(),
            cash_cents: cash.cents(),
            remaining_balance_cents: remaining.cents(),
            client_secret,
        })
    }

    /// Settles the card leg of a split: records the gateway outcome on
    /// the existing payment row and flips the transaction to settled.
    ///
    /// An already-settled card leg returns the prior outcome without a
    /// gateway call. A split initiated with zero cash has no payment
    /// row to update and reports `PaymentRecordNotFound`; such sales
    /// belong on the plain card flow.
    pub async fn confirm_split(
        &self,
        request: SplitConfirmRequest,
    ) -> EngineResult<SettlementOutcome> {
        let intent_id = intent_id_from_client_secret(&request.client_secret).to_string();

        let txn = self
            .db
            .transactions()
            .get_by_id(&request.transaction_id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound {
                id: request.transaction_id.clone(),
            })?;
        if txn.status == TransactionStatus::Voided {
            return Err(EngineError::invariant(format!(
                "transaction {} is voided; its card leg cannot settle",
                txn.id
            )));
        }

        let payment = self
            .db
            .transactions()
            .payment_for_transaction(&txn.id)
            .await?
            .ok_or_else(|| EngineError::PaymentRecordNotFound {
                transaction_id: txn.id.clone(),
            })?;

        if payment.is_card_settled() {
            debug!(transaction_id = %txn.id, "Split confirm replayed");
            return Ok(SettlementOutcome {
                transaction_id: txn.id,
                status: TransactionStatus::Settled,
            });
        }

        let status = self.gateway.retrieve_intent(&intent_id).await?;
        if status.status != GATEWAY_STATUS_SUCCEEDED {
            return Err(EngineError::PaymentNotSucceeded {
                status: status.status,
            });
        }

        let mut tx = self.db.pool().begin().await?;
        let updated = self
            .db
            .transactions()
            .update_payment_card_leg(
                &mut tx,
                &payment.id,
                status.amount_received_minor,
                &intent_id,
                &status.status,
            )
            .await?;
        if !updated {
            return Err(EngineError::invariant(format!(
                "payment row {} vanished while settling the card leg",
                payment.id
            )));
        }
        // False when a racing confirm settled it first; the card leg
        // write above lands the same values either way.
        self.db.transactions().mark_settled(&mut tx, &txn.id).await?;
        tx.commit().await?;

        info!(
            transaction_id = %txn.id,
            intent_id = %intent_id,
            card_cents = status.amount_received_minor,
            "Settled split payment"
        );
        record_detached(
            &self.audit,
            AuditEntry::new(
                "payment.split.confirm",
                None,
                "transaction",
                Some(txn.id.clone()),
                Some(
                    json!({
                        "intent_id": intent_id,
                        "card_cents": status.amount_received_minor,
                    })
                    .to_string(),
                ),
            ),
        );

        Ok(SettlementOutcome {
            transaction_id: txn.id,
            status: TransactionStatus::Settled,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::DbAuditSink;
    use crate::gateway::mock::MockGateway;
    use chrono::{Duration, Utc};
    use meridian_core::{Discount, Product, TenderMethod};

    async fn test_db() -> Arc<Database> {
        Arc::new(Database::in_memory().await.unwrap())
    }

    fn settlement(db: &Arc<Database>, mock: &Arc<MockGateway>) -> PaymentSettlement {
        let sink: Arc<dyn AuditSink> = Arc::new(DbAuditSink::new(Arc::clone(db)));
        let gateway: Arc<dyn PaymentGateway> = Arc::clone(mock) as Arc<dyn PaymentGateway>;
        PaymentSettlement::new(Arc::clone(db), gateway, sink)
    }

    async fn seed_product(db: &Arc<Database>, sku: &str, price_cents: i64, stock: i64) -> Product {
        let mut product = Product::new(sku, format!("{sku} item"), Money::from_cents(price_cents));
        product.stock = stock;
        let mut tx = db.pool().begin().await.unwrap();
        db.products().insert(&mut tx, &product).await.unwrap();
        tx.commit().await.unwrap();
        product
    }

    async fn seed_percentage_discount(db: &Arc<Database>, code: &str, basis_points: u32) -> Discount {
        let now = Utc::now();
        let discount = Discount::percentage(
            code,
            basis_points,
            now - Duration::hours(1),
            now + Duration::hours(1),
        );
        db.discounts().insert(&discount).await.unwrap();
        discount
    }

    async fn stock_of(db: &Arc<Database>, id: &str) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock
    }

    fn lines(product: &Product, quantity: i64) -> Vec<CartLine> {
        vec![CartLine {
            product_id: product.id.clone(),
            quantity,
        }]
    }

    fn cash_request(product: &Product, quantity: i64, tendered: i64) -> CashPaymentRequest {
        CashPaymentRequest {
            items: lines(product, quantity),
            tendered_cash_cents: tendered,
            customer_id: None,
            discount_code: None,
            promotion_name: None,
            cashier: Some("cashier-1".to_string()),
        }
    }

    fn split_request(product: &Product, quantity: i64, cash: i64) -> SplitPaymentRequest {
        SplitPaymentRequest {
            items: lines(product, quantity),
            cash_amount_cents: cash,
            customer_id: None,
            discount_code: None,
            promotion_name: None,
            cashier: None,
        }
    }

    // ===== Cash =====

    #[tokio::test]
    async fn test_cash_payment_settles_with_change() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "BEV-001", 1700, 10).await;

        let receipt = settlement
            .pay_cash(cash_request(&product, 2, 5000))
            .await
            .unwrap();

        assert_eq!(receipt.total_cents, 3400);
        assert_eq!(receipt.tendered_cents, 5000);
        assert_eq!(receipt.balance_cents, 1600);
        assert_eq!(stock_of(&db, &product.id).await, 8);

        let payment = db
            .transactions()
            .payment_for_transaction(&receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.method, TenderMethod::Cash);
        assert_eq!(payment.cash_cents, 5000);
        assert_eq!(payment.change_cents, 1600);

        let txn = db
            .transactions()
            .get_by_id(&receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(txn.status, TransactionStatus::Settled);
        assert_eq!(txn.total_cents, 3400);
    }

    #[tokio::test]
    async fn test_cash_insufficient_tender_writes_nothing() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "BEV-002", 1700, 10).await;

        let err = settlement
            .pay_cash(cash_request(&product, 2, 3000))
            .await
            .unwrap_err();
        match err {
            EngineError::InsufficientTender { total, tendered } => {
                assert_eq!(total.cents(), 3400);
                assert_eq!(tendered.cents(), 3000);
            }
            other => panic!("expected InsufficientTender, got {other:?}"),
        }

        assert_eq!(stock_of(&db, &product.id).await, 10);
        assert!(db.transactions().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cash_negative_tender_rejected() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "BEV-003", 1700, 10).await;

        let err = settlement
            .pay_cash(cash_request(&product, 1, -100))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cash_with_discount_code() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "BEV-004", 1700, 10).await;
        let discount = seed_percentage_discount(&db, "SAVE10", 1000).await;

        let mut request = cash_request(&product, 2, 3060);
        request.discount_code = Some("SAVE10".to_string());
        let receipt = settlement.pay_cash(request).await.unwrap();

        assert_eq!(receipt.total_cents, 3060);
        assert_eq!(receipt.balance_cents, 0);

        let txn = db
            .transactions()
            .get_by_id(&receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(txn.subtotal_cents, 3400);
        assert_eq!(txn.total_cents, 3060);
        assert_eq!(txn.discount_id.as_deref(), Some(discount.id.as_str()));
    }

    // ===== Card =====

    #[tokio::test]
    async fn test_card_intent_prices_cart_without_rows() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "SNK-001", 850, 6).await;

        let intent = settlement
            .create_card_intent(CardIntentRequest {
                items: lines(&product, 4),
                discount_code: None,
                promotion_name: None,
            })
            .await
            .unwrap();

        assert_eq!(intent.amount_cents, 3400);
        assert_eq!(mock.intent_amount(&intent.intent_id), Some(3400));
        assert!(db.transactions().list_recent(10).await.unwrap().is_empty());
        assert_eq!(stock_of(&db, &product.id).await, 6);
    }

    #[tokio::test]
    async fn test_card_confirm_settles() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "SNK-002", 850, 6).await;

        let intent = settlement
            .create_card_intent(CardIntentRequest {
                items: lines(&product, 4),
                discount_code: None,
                promotion_name: None,
            })
            .await
            .unwrap();

        let outcome = settlement
            .confirm_card(CardConfirmRequest {
                client_secret: intent.client_secret,
                items: lines(&product, 4),
                customer_id: None,
                cashier: Some("cashier-2".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome.status, TransactionStatus::Settled);
        assert_eq!(stock_of(&db, &product.id).await, 2);

        let payment = db
            .transactions()
            .payment_for_transaction(&outcome.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.method, TenderMethod::Card);
        assert_eq!(payment.card_cents, 3400);
        assert_eq!(payment.gateway_intent_id.as_deref(), Some(intent.intent_id.as_str()));
        assert!(payment.is_card_settled());

        let txn = db
            .transactions()
            .get_by_id(&outcome.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(txn.subtotal_cents, 3400);
        assert_eq!(txn.total_cents, 3400);
    }

    #[tokio::test]
    async fn test_card_confirm_carries_intent_time_discount() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "SNK-006", 1700, 6).await;
        seed_percentage_discount(&db, "SAVE10", 1000).await;

        let intent = settlement
            .create_card_intent(CardIntentRequest {
                items: lines(&product, 2),
                discount_code: Some("SAVE10".to_string()),
                promotion_name: None,
            })
            .await
            .unwrap();
        assert_eq!(intent.amount_cents, 3060);

        let outcome = settlement
            .confirm_card(CardConfirmRequest {
                client_secret: intent.client_secret,
                items: lines(&product, 2),
                customer_id: None,
                cashier: None,
            })
            .await
            .unwrap();

        // The header total records what the gateway captured; the
        // frozen line snapshots keep the pre-discount subtotal.
        let txn = db
            .transactions()
            .get_by_id(&outcome.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(txn.subtotal_cents, 3400);
        assert_eq!(txn.total_cents, 3060);

        let payment = db
            .transactions()
            .payment_for_transaction(&outcome.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.card_cents, 3060);
        assert!(payment.total_paid() >= Money::from_cents(txn.total_cents));
    }

    #[tokio::test]
    async fn test_card_confirm_replay_is_idempotent() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "SNK-003", 850, 6).await;

        let intent = settlement
            .create_card_intent(CardIntentRequest {
                items: lines(&product, 2),
                discount_code: None,
                promotion_name: None,
            })
            .await
            .unwrap();
        let confirm = CardConfirmRequest {
            client_secret: intent.client_secret,
            items: lines(&product, 2),
            customer_id: None,
            cashier: None,
        };

        let first = settlement.confirm_card(confirm.clone()).await.unwrap();
        let second = settlement.confirm_card(confirm).await.unwrap();

        assert_eq!(first.transaction_id, second.transaction_id);
        // The replay answered from the store without a second gateway
        // round trip or a second decrement.
        assert_eq!(mock.retrieve_calls(), 1);
        assert_eq!(stock_of(&db, &product.id).await, 4);
        assert_eq!(db.transactions().list_recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_card_confirm_not_succeeded_writes_nothing() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::with_status("requires_payment_method"));
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "SNK-004", 850, 6).await;

        let intent = settlement
            .create_card_intent(CardIntentRequest {
                items: lines(&product, 2),
                discount_code: None,
                promotion_name: None,
            })
            .await
            .unwrap();

        let err = settlement
            .confirm_card(CardConfirmRequest {
                client_secret: intent.client_secret,
                items: lines(&product, 2),
                customer_id: None,
                cashier: None,
            })
            .await
            .unwrap_err();

        match err {
            EngineError::PaymentNotSucceeded { status } => {
                assert_eq!(status, "requires_payment_method");
            }
            other => panic!("expected PaymentNotSucceeded, got {other:?}"),
        }
        assert!(db.transactions().list_recent(10).await.unwrap().is_empty());
        assert_eq!(stock_of(&db, &product.id).await, 6);
    }

    #[tokio::test]
    async fn test_card_confirm_unknown_intent() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "SNK-005", 850, 6).await;

        let err = settlement
            .confirm_card(CardConfirmRequest {
                client_secret: "pi_missing_secret_x".to_string(),
                items: lines(&product, 1),
                customer_id: None,
                cashier: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Gateway(_)));
        assert!(db.transactions().list_recent(10).await.unwrap().is_empty());
    }

    // ===== Split =====

    #[tokio::test]
    async fn test_split_initiation_holds_pending() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "GRO-001", 2500, 9).await;

        let initiation = settlement
            .pay_split(split_request(&product, 4, 4000))
            .await
            .unwrap();

        assert_eq!(initiation.total_cents, 10000);
        assert_eq!(initiation.cash_cents, 4000);
        assert_eq!(initiation.remaining_balance_cents, 6000);
        assert!(initiation.client_secret.is_some());

        let txn = db
            .transactions()
            .get_by_id(&initiation.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(txn.status, TransactionStatus::Pending);

        let payment = db
            .transactions()
            .payment_for_transaction(&initiation.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.method, TenderMethod::Split);
        assert_eq!(payment.cash_cents, 4000);
        assert_eq!(payment.card_cents, 0);
        assert!(!payment.is_card_settled());

        // Stock is held while the card leg is outstanding.
        assert_eq!(stock_of(&db, &product.id).await, 5);

        let metadata = mock.last_metadata();
        assert!(metadata.contains(&(
            "transaction_id".to_string(),
            initiation.transaction_id.clone()
        )));
    }

    #[tokio::test]
    async fn test_split_confirm_updates_same_row() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "GRO-002", 2500, 9).await;

        let initiation = settlement
            .pay_split(split_request(&product, 4, 4000))
            .await
            .unwrap();
        let before = db
            .transactions()
            .payment_for_transaction(&initiation.transaction_id)
            .await
            .unwrap()
            .unwrap();

        let outcome = settlement
            .confirm_split(SplitConfirmRequest {
                client_secret: initiation.client_secret.clone().unwrap(),
                transaction_id: initiation.transaction_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, TransactionStatus::Settled);

        let after = db
            .transactions()
            .payment_for_transaction(&initiation.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.method, TenderMethod::Split);
        assert_eq!(after.cash_cents, 4000);
        assert_eq!(after.card_cents, 6000);
        assert_eq!(after.total_paid(), Money::from_cents(10000));
        assert!(after.is_card_settled());

        let txn = db
            .transactions()
            .get_by_id(&initiation.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(txn.status, TransactionStatus::Settled);
    }

    #[tokio::test]
    async fn test_split_all_cash_settles_immediately() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "GRO-003", 2500, 9).await;

        let initiation = settlement
            .pay_split(split_request(&product, 2, 5000))
            .await
            .unwrap();

        assert_eq!(initiation.remaining_balance_cents, 0);
        assert!(initiation.client_secret.is_none());
        assert_eq!(mock.create_calls(), 0);

        let txn = db
            .transactions()
            .get_by_id(&initiation.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(txn.status, TransactionStatus::Settled);
    }

    #[tokio::test]
    async fn test_split_excess_cash_rejected() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "GRO-004", 2500, 9).await;

        let err = settlement
            .pay_split(split_request(&product, 2, 6000))
            .await
            .unwrap_err();
        match err {
            EngineError::ExcessCashTender { total, cash } => {
                assert_eq!(total.cents(), 5000);
                assert_eq!(cash.cents(), 6000);
            }
            other => panic!("expected ExcessCashTender, got {other:?}"),
        }
        assert_eq!(stock_of(&db, &product.id).await, 9);
        assert!(db.transactions().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_split_confirm_replay_short_circuits() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "GRO-005", 2500, 9).await;

        let initiation = settlement
            .pay_split(split_request(&product, 4, 4000))
            .await
            .unwrap();
        let confirm = SplitConfirmRequest {
            client_secret: initiation.client_secret.clone().unwrap(),
            transaction_id: initiation.transaction_id.clone(),
        };

        settlement.confirm_split(confirm.clone()).await.unwrap();
        let replay = settlement.confirm_split(confirm).await.unwrap();

        assert_eq!(replay.transaction_id, initiation.transaction_id);
        assert_eq!(mock.retrieve_calls(), 1);

        let payment = db
            .transactions()
            .payment_for_transaction(&initiation.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.card_cents, 6000);
    }

    #[tokio::test]
    async fn test_split_zero_cash_has_no_payment_row() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "GRO-006", 2500, 9).await;

        let initiation = settlement
            .pay_split(split_request(&product, 2, 0))
            .await
            .unwrap();
        assert!(initiation.client_secret.is_some());

        let err = settlement
            .confirm_split(SplitConfirmRequest {
                client_secret: initiation.client_secret.unwrap(),
                transaction_id: initiation.transaction_id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PaymentRecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_split_confirm_unknown_transaction() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);

        let err = settlement
            .confirm_split(SplitConfirmRequest {
                client_secret: "pi_x_secret_y".to_string(),
                transaction_id: "no-such-txn".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TransactionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_split_confirm_voided_transaction_rejected() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "GRO-007", 2500, 9).await;

        let initiation = settlement
            .pay_split(split_request(&product, 4, 4000))
            .await
            .unwrap();

        let sink: Arc<dyn AuditSink> = Arc::new(DbAuditSink::new(Arc::clone(&db)));
        let builder = TransactionBuilder::new(Arc::clone(&db), sink);
        builder
            .void_transaction(&initiation.transaction_id, None)
            .await
            .unwrap();

        let err = settlement
            .confirm_split(SplitConfirmRequest {
                client_secret: initiation.client_secret.unwrap(),
                transaction_id: initiation.transaction_id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    #[tokio::test]
    async fn test_split_gateway_failure_leaves_pending_sale() {
        let db = test_db().await;
        let mock = Arc::new(MockGateway::succeeding().failing_create());
        let settlement = settlement(&db, &mock);
        let product = seed_product(&db, "GRO-008", 2500, 9).await;

        let err = settlement
            .pay_split(split_request(&product, 4, 4000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Gateway(_)));

        // The sale committed before the gateway call; it stays pending
        // with its cash leg for the cashier to void or re-initiate.
        let recent = db.transactions().list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, TransactionStatus::Pending);
        assert_eq!(stock_of(&db, &product.id).await, 5);
    }
}
