//! # meridian-engine: Settlement Engine for Meridian POS
//!
//! This crate is where carts become money: pricing, stock custody,
//! transaction assembly, and payment settlement over cash, card, and
//! split tenders.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Settlement Engine Layout                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                    PaymentSettlement (tender flows)              │   │
//! │  │                                                                  │   │
//! │  │  pay_cash            one commit: txn + items + stock + payment   │   │
//! │  │  create_card_intent  price the cart, open a gateway intent       │   │
//! │  │  confirm_card        verify succeeded, then commit (idempotent)  │   │
//! │  │  pay_split           pending txn + cash leg, intent for rest     │   │
//! │  │  confirm_split       card leg onto the same payment row          │   │
//! │  └───────┬──────────────────────┬──────────────────────┬────────────┘   │
//! │          ▼                      ▼                      ▼                │
//! │  ┌───────────────┐  ┌────────────────────┐  ┌────────────────────┐      │
//! │  │ PricingEngine │  │ TransactionBuilder │  │   PaymentGateway   │      │
//! │  │               │  │                    │  │                    │      │
//! │  │ price carts   │  │ header + items +   │  │ trait over the     │      │
//! │  │ discounts and │  │ stock decrements   │  │ card provider;     │      │
//! │  │ promotions    │  │ in one unit;       │  │ HTTP impl plus a   │      │
//! │  │ (discount     │  │ voids restore      │  │ scripted mock for  │      │
//! │  │  first)       │  │ stock              │  │ tests              │      │
//! │  └───────────────┘  └─────────┬──────────┘  └────────────────────┘      │
//! │                               ▼                                         │
//! │                     ┌────────────────────┐  ┌────────────────────┐      │
//! │                     │    StockLedger     │  │     AuditSink      │      │
//! │                     │                    │  │                    │      │
//! │                     │ guarded decrements │  │ fire-and-forget    │      │
//! │                     │ entries, reversals │  │ audit trail        │      │
//! │                     └────────────────────┘  └────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`audit`] - Fire-and-forget audit trail sink
//! - [`checkout`] - Transaction assembly and voiding
//! - [`error`] - Engine error types
//! - [`gateway`] - Card gateway trait and HTTP client
//! - [`pricing`] - Cart pricing, discounts, promotions
//! - [`settlement`] - Cash, card, and split tender flows
//! - [`stock`] - Stock custody and the movement ledger
//!
//! ## Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use meridian_db::{Database, DbConfig};
//! use meridian_engine::{
//!     CashPaymentRequest, DbAuditSink, GatewayConfig, HttpPaymentGateway, PaymentSettlement,
//! };
//!
//! let db = Arc::new(Database::new(DbConfig::new("meridian.db")).await?);
//! let gateway = Arc::new(HttpPaymentGateway::new(GatewayConfig::new(
//!     "https://api.stripe.com",
//!     secret_key,
//! ))?);
//! let audit = Arc::new(DbAuditSink::new(Arc::clone(&db)));
//!
//! let settlement = PaymentSettlement::new(db, gateway, audit);
//! let receipt = settlement.pay_cash(CashPaymentRequest {
//!     items: cart,
//!     tendered_cash_cents: 5000,
//!     customer_id: None,
//!     discount_code: None,
//!     promotion_name: None,
//!     cashier: Some("till-3".into()),
//! }).await?;
//! println!("change due: {}", receipt.balance_cents);
//! ```

pub mod audit;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod pricing;
pub mod settlement;
pub mod stock;

pub use audit::{record_detached, AuditSink, DbAuditSink};
pub use checkout::{
    CommittedTransaction, CreateTransactionRequest, TransactionBuilder, TransactionDetail,
};
pub use error::{EngineError, EngineResult};
pub use gateway::{
    intent_id_from_client_secret, GatewayConfig, GatewayError, HttpPaymentGateway, IntentStatus,
    PaymentGateway, PaymentIntent,
};
pub use pricing::{AppliedAdjustments, PricedCart, PricedLine, PricingEngine};
pub use settlement::{
    CardConfirmRequest, CardIntent, CardIntentRequest, CashPaymentRequest, CashReceipt,
    PaymentSettlement, SettlementOutcome, SplitConfirmRequest, SplitInitiation,
    SplitPaymentRequest, DEFAULT_CURRENCY,
};
pub use stock::StockLedger;
