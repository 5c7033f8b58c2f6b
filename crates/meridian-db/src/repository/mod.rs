//! # Repository Module
//!
//! Database repository implementations for Meridian POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Settlement engine                                                     │
//! │       │                                                                 │
//! │       │  db.products().decrement_stock(&mut tx, id, 3)                 │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── get_by_id(&self, id)              ← pool reads                    │
//! │  ├── insert(&self, conn, product)      ← caller-owned transaction      │
//! │  └── decrement_stock(&self, conn, ...) ← guarded update                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • SQL is isolated in one place                                        │
//! │  • Atomicity stays in the caller's hands where it belongs              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product rows and guarded stock updates
//! - [`stock::StockEntryRepository`] - Append-only stock ledger entries
//! - [`discount::DiscountRepository`] - Discount rules and expiry sweep
//! - [`discount::PromotionRepository`] - Promotions and eligible products
//! - [`transaction::TransactionRepository`] - Headers, items, and payments
//! - [`audit::AuditRepository`] - Fire-and-forget audit trail

pub mod audit;
pub mod discount;
pub mod product;
pub mod stock;
pub mod transaction;
