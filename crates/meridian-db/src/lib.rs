//! # meridian-db: Database Layer for Meridian POS
//!
//! This crate provides database access for the Meridian POS settlement
//! engine. It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Meridian POS Data Flow                             │
//! │                                                                         │
//! │  meridian-engine (PaymentSettlement, StockLedger, ...)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   meridian-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ StockRepo     │    │ 0001_core…   │  │   │
//! │  │   │ Connection    │    │ DiscountRepo  │    │ 0002_audit…  │  │   │
//! │  │   │ Management    │    │ TxnRepo ...   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL mode, foreign keys on)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactional Writes
//!
//! Settlement flows need header + items + stock deltas + payment to commit
//! or roll back as one unit. Write methods on the repositories therefore
//! take `&mut SqliteConnection` so the caller controls the transaction:
//!
//! ```rust,ignore
//! let mut tx = db.pool().begin().await?;
//! db.transactions().insert_header(&mut tx, &header).await?;
//! db.products().decrement_stock(&mut tx, &product_id, qty).await?;
//! tx.commit().await?;
//! ```
//!
//! Read methods run against the pool unless a `_tx` variant exists for
//! reads that must observe in-transaction state.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, stock, ...)

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::audit::AuditRepository;
pub use repository::discount::{DiscountRepository, PromotionRepository};
pub use repository::product::ProductRepository;
pub use repository::stock::StockEntryRepository;
pub use repository::transaction::TransactionRepository;
