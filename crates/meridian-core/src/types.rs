//! # Domain Types
//!
//! Core domain types for Meridian POS. These are plain data structures with
//! constructor helpers; all persistence lives in meridian-db, all
//! orchestration in meridian-engine.
//!
//! ## Type Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Settlement Data Model                            │
//! │                                                                         │
//! │  ┌─────────────┐     ┌─────────────────┐      ┌─────────────────┐      │
//! │  │   Product   │◄────┤   StockEntry    │      │    Discount     │      │
//! │  │ unit_price  │     │  signed delta   │      │  kind + value   │      │
//! │  │ stock ≥ 0   │     │  (append-only)  │      └────────▲────────┘      │
//! │  └──────▲──────┘     └─────────────────┘               │               │
//! │         │ snapshot                             ┌───────┴────────┐      │
//! │  ┌──────┴──────────┐                           │   Promotion    │      │
//! │  │ TransactionItem │                           │  name → rule   │      │
//! │  │ line_total      │                           └────────────────┘      │
//! │  │ (frozen price)  │                                                   │
//! │  └──────▲──────────┘                                                   │
//! │         │ 1..N                                                         │
//! │  ┌──────┴──────────┐  1..1  ┌─────────────────┐                        │
//! │  │   Transaction   │◄───────┤     Payment     │                        │
//! │  │ subtotal/total  │        │ cash/card legs  │                        │
//! │  │ status          │        │ gateway fields  │                        │
//! │  └─────────────────┘        └─────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - IDs are UUID v4 strings (TEXT in SQLite, coordination-free)
//! - Monetary fields are raw `i64` cents named `*_cents`, matching column
//!   names exactly; `Money` accessors are provided for arithmetic
//! - Enums serialize lowercase in both JSON and SQLite

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;
use crate::{DEFAULT_BRANCH_ID, GATEWAY_STATUS_SUCCEEDED};

// =============================================================================
// Product
// =============================================================================

/// A sellable product with its current stock level.
///
/// ## Stock Invariant
/// `stock >= 0` at all times. Stock is mutated only through StockLedger
/// operations (guarded decrements during checkout, signed ledger entries
/// for restocks/corrections), never by direct field writes at the edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - unique product code.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Optional longer description.
    pub description: Option<String>,

    /// Unit price in cents (smallest currency unit).
    pub unit_price_cents: i64,

    /// Current stock on hand. Never negative.
    pub stock: i64,

    /// Branch this product belongs to.
    pub branch_id: String,

    /// Soft-delete / listing flag.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product with zero stock in the default branch.
    ///
    /// Opening stock arrives through the stock ledger so the very first
    /// units on hand have a ledger entry like every later adjustment.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, unit_price: Money) -> Self {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.into(),
            name: name.into(),
            description: None,
            unit_price_cents: unit_price.cents(),
            stock: 0,
            branch_id: DEFAULT_BRANCH_ID.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the unit price as a Money type.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

/// Input payload for registering a new product.
///
/// `opening_stock` becomes an "opening stock" ledger entry created in the
/// same unit of work as the product row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub opening_stock: i64,
    #[serde(default)]
    pub branch_id: Option<String>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// An append-only stock ledger entry.
///
/// ## Ledger Semantics
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Every stock movement outside checkout is a StockEntry:                 │
/// │                                                                         │
/// │    delta = +24   restock ("received delivery")                          │
/// │    delta = -3    correction ("breakage", "shrinkage")                   │
/// │                                                                         │
/// │  Creating an entry adjusts Product.stock in the same unit of work.     │
/// │  Reversing an entry applies the inverse delta and tombstones the       │
/// │  entry (reversed = true); the ledger itself is never rewritten.        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockEntry {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Product this entry adjusts.
    pub product_id: String,

    /// Signed quantity delta. Positive = restock, negative = correction.
    pub delta: i64,

    /// Free-form note ("opening stock", "supplier delivery #4411", ...).
    pub note: Option<String>,

    /// Actor who recorded the entry.
    pub recorded_by: Option<String>,

    /// True once the entry has been reversed. Reversed entries are inert.
    pub reversed: bool,

    /// When the reversal happened, if it did.
    pub reversed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl StockEntry {
    /// Creates a new (unreversed) ledger entry.
    pub fn new(
        product_id: impl Into<String>,
        delta: i64,
        note: Option<String>,
        recorded_by: Option<String>,
    ) -> Self {
        StockEntry {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.into(),
            delta,
            note,
            recorded_by,
            reversed: false,
            reversed_at: None,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Discounts & Promotions
// =============================================================================

/// How a discount's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `value` is basis points off (1000 = 10%).
    Percentage,
    /// `value` is a fixed amount in cents, floored at zero.
    Fixed,
}

/// A discount rule addressable by code at checkout.
///
/// ## Validity
/// A discount applies only while `is_active` AND `now` is inside
/// `[starts_at, ends_at]`. The periodic sweep flips `is_active` after
/// `ends_at`, but validity is also enforced lazily on read, so a stale
/// flag can never resurrect an expired code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Discount {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Unique checkout code ("SAVE10").
    pub code: String,

    /// Percentage or fixed.
    pub kind: DiscountKind,

    /// Basis points for percentage, cents for fixed.
    pub value: i64,

    /// Start of validity window (inclusive).
    pub starts_at: DateTime<Utc>,

    /// End of validity window (inclusive).
    pub ends_at: DateTime<Utc>,

    /// Active flag, flipped off by the expiry sweep.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// Creates a percentage discount (`bps` basis points off).
    pub fn percentage(
        code: impl Into<String>,
        bps: u32,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self::with_kind(code, DiscountKind::Percentage, bps as i64, starts_at, ends_at)
    }

    /// Creates a fixed-amount discount.
    pub fn fixed(
        code: impl Into<String>,
        amount: Money,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self::with_kind(code, DiscountKind::Fixed, amount.cents(), starts_at, ends_at)
    }

    fn with_kind(
        code: impl Into<String>,
        kind: DiscountKind,
        value: i64,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Discount {
            id: Uuid::new_v4().to_string(),
            code: code.into(),
            kind,
            value,
            starts_at,
            ends_at,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the discount can be applied at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now >= self.starts_at && now <= self.ends_at
    }

    /// Applies this discount's rule to an amount.
    ///
    /// Percentage: subtract the rounded bps portion.
    /// Fixed: subtract `value` cents, flooring at zero.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{Duration, Utc};
    /// use meridian_core::money::Money;
    /// use meridian_core::types::Discount;
    ///
    /// let now = Utc::now();
    /// let ten_off = Discount::percentage("SAVE10", 1000, now, now + Duration::days(7));
    /// assert_eq!(ten_off.apply(Money::from_cents(10000)).cents(), 9000);
    /// ```
    pub fn apply(&self, amount: Money) -> Money {
        match self.kind {
            DiscountKind::Percentage => amount.apply_percentage_discount(self.value as u32),
            DiscountKind::Fixed => amount.apply_fixed_discount(Money::from_cents(self.value)),
        }
    }
}

/// A named promotion that resolves to a discount rule.
///
/// The promotion carries its own validity window and active flag; the
/// referenced Discount contributes only the kind/value rule. Eligible
/// products live in a join table managed by meridian-db.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Promotion {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Unique promotion name ("SUMMER-KICKOFF").
    pub name: String,

    pub description: Option<String>,

    /// The discount whose rule this promotion applies.
    pub discount_id: String,

    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    /// Creates a promotion pointing at an existing discount.
    pub fn new(
        name: impl Into<String>,
        discount_id: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Promotion {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            discount_id: discount_id.into(),
            starts_at,
            ends_at,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the promotion can be applied at `now`.
    ///
    /// Judged on the promotion's own window and flag, not the referenced
    /// discount's.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now >= self.starts_at && now <= self.ends_at
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// Lifecycle status of a transaction.
///
/// ## Settlement States
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  cash path:   (no row) ──────────────────────────► settled              │
/// │  card path:   (intent outstanding, no row) ──────► settled on confirm   │
/// │  split path:  pending (cash leg recorded) ───────► settled on confirm   │
/// │                                                                         │
/// │  voided: administrative correction (stock restored, then immutable)    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Committed, awaiting the card leg of a split tender.
    Pending,
    /// Fully settled; terminal except for administrative void.
    Settled,
    /// Administratively corrected; stock restored.
    Voided,
}

/// A committed sale header.
///
/// ## Monetary Invariants
/// - `subtotal_cents` == Σ `line_total_cents` of its items
/// - `total_cents` == subtotal adjusted by discount/promotion at checkout
/// - once settled, `payment.cash_cents + payment.card_cents >= total_cents`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub status: TransactionStatus,

    /// Pre-discount sum of item line totals, in cents.
    pub subtotal_cents: i64,

    /// Amount actually owed after discount/promotion, in cents.
    pub total_cents: i64,

    /// Optional customer reference (customers are managed elsewhere).
    pub customer_id: Option<String>,

    /// Discount applied at checkout, if any.
    pub discount_id: Option<String>,

    /// Promotion applied at checkout, if any.
    pub promotion_id: Option<String>,

    /// Actor who created the transaction.
    pub created_by: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates an empty header in the given status. Monetary fields start
    /// at zero and are reconciled once items are attached.
    pub fn new(status: TransactionStatus) -> Self {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4().to_string(),
            status,
            subtotal_cents: 0,
            total_cents: 0,
            customer_id: None,
            discount_id: None,
            promotion_id: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the pre-discount subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Returns the owed total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Whether this transaction has reached a settled state.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.status == TransactionStatus::Settled
    }
}

/// One product-and-quantity line within a transaction.
///
/// ## Frozen Snapshot
/// `sku`, `name`, `unit_price_cents`, and `line_total_cents` are captured
/// at sale time. Later price changes never alter a committed line; a
/// receipt reprinted in a year shows what the customer actually paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransactionItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub transaction_id: String,
    pub product_id: String,

    /// SKU at time of sale (frozen).
    pub sku: String,

    /// Product name at time of sale (frozen).
    pub name: String,

    /// Units sold. Always positive; duplicate product lines stay separate.
    pub quantity: i64,

    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,

    /// `quantity × unit_price_cents`, computed once at creation.
    pub line_total_cents: i64,

    pub created_at: DateTime<Utc>,
}

impl TransactionItem {
    /// Builds a line by snapshotting the product at this moment.
    pub fn from_product(
        transaction_id: impl Into<String>,
        product: &Product,
        quantity: i64,
    ) -> Self {
        let line_total = product.unit_price().multiply_quantity(quantity);
        TransactionItem {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.into(),
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity,
            unit_price_cents: product.unit_price_cents,
            line_total_cents: line_total.cents(),
            created_at: Utc::now(),
        }
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Payments
// =============================================================================

/// The tender method chosen for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum TenderMethod {
    Cash,
    Card,
    Split,
}

/// The payment record for a transaction; exactly one exists per transaction.
///
/// ## Split Tenders
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  pay_split(cash = $40 of $100)                                          │
/// │    → Payment { method: split, cash_cents: 4000, card_cents: 0 }         │
/// │                                                                         │
/// │  confirm_split(gateway reports $60 received)                            │
/// │    → SAME row updated: card_cents: 6000, gateway fields set             │
/// │                                                                         │
/// │  The row is updated in place; a split never grows a second Payment.    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub transaction_id: String,
    pub method: TenderMethod,

    /// Cash handed over, in cents (the full tendered amount for cash pay).
    pub cash_cents: i64,

    /// Amount received via the card gateway, in cents.
    pub card_cents: i64,

    /// Change returned to the customer on cash overpay, in cents.
    pub change_cents: i64,

    /// Gateway intent that settled (or will settle) the card leg.
    /// Unique across payments; the idempotency key for confirms.
    pub gateway_intent_id: Option<String>,

    /// Last known gateway status for the intent.
    pub gateway_status: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// A settled cash payment: full tender recorded, change computed.
    pub fn cash(transaction_id: impl Into<String>, tendered: Money, change: Money) -> Self {
        let mut p = Self::empty(transaction_id, TenderMethod::Cash);
        p.cash_cents = tendered.cents();
        p.change_cents = change.cents();
        p
    }

    /// A settled card payment carrying the gateway outcome.
    pub fn card(
        transaction_id: impl Into<String>,
        amount: Money,
        gateway_intent_id: impl Into<String>,
        gateway_status: impl Into<String>,
    ) -> Self {
        let mut p = Self::empty(transaction_id, TenderMethod::Card);
        p.card_cents = amount.cents();
        p.gateway_intent_id = Some(gateway_intent_id.into());
        p.gateway_status = Some(gateway_status.into());
        p
    }

    /// The cash leg of a split payment. Card fields stay empty until the
    /// gateway confirm updates this row in place.
    pub fn split_cash(transaction_id: impl Into<String>, cash: Money) -> Self {
        let mut p = Self::empty(transaction_id, TenderMethod::Split);
        p.cash_cents = cash.cents();
        p
    }

    fn empty(transaction_id: impl Into<String>, method: TenderMethod) -> Self {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.into(),
            method,
            cash_cents: 0,
            card_cents: 0,
            change_cents: 0,
            gateway_intent_id: None,
            gateway_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total value received across both legs.
    #[inline]
    pub fn total_paid(&self) -> Money {
        Money::from_cents(self.cash_cents + self.card_cents)
    }

    /// Whether the card leg has a succeeded gateway status.
    #[inline]
    pub fn is_card_settled(&self) -> bool {
        self.gateway_status.as_deref() == Some(GATEWAY_STATUS_SUCCEEDED)
    }
}

// =============================================================================
// Cart Input
// =============================================================================

/// One requested line of a cart: which product, how many.
///
/// This is caller input; prices are resolved server-side at pricing time,
/// never trusted from the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
}

// =============================================================================
// Audit Trail
// =============================================================================

/// A fire-and-forget audit record.
///
/// Written off the request path; failures to record are logged and
/// swallowed, never surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditEntry {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// What happened ("transaction.settled", "stock.reversed", ...).
    pub action: String,

    /// Who did it, when known.
    pub actor: Option<String>,

    /// Kind of resource touched ("transaction", "product", ...).
    pub resource_name: String,

    /// Identifier of the touched resource.
    pub resource_id: Option<String>,

    /// JSON details payload, already serialized.
    pub details: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        actor: Option<String>,
        resource_name: impl Into<String>,
        resource_id: Option<String>,
        details: Option<String>,
    ) -> Self {
        AuditEntry {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            actor,
            resource_name: resource_name.into(),
            resource_id,
            details,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
