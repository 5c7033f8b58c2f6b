//! Shared application state.

use std::sync::Arc;

use meridian_db::Database;
use meridian_engine::{
    AuditSink, DbAuditSink, PaymentGateway, PaymentSettlement, StockLedger, TransactionBuilder,
};

/// Engine services shared across handlers.
pub struct AppState {
    pub db: Arc<Database>,
    pub settlement: PaymentSettlement,
    pub stock: StockLedger,
    pub builder: TransactionBuilder,
}

impl AppState {
    /// Wires the engine services over one database and gateway.
    pub fn new(db: Arc<Database>, gateway: Arc<dyn PaymentGateway>, currency: String) -> Self {
        let audit: Arc<dyn AuditSink> = Arc::new(DbAuditSink::new(Arc::clone(&db)));
        let settlement = PaymentSettlement::new(Arc::clone(&db), gateway, Arc::clone(&audit))
            .with_currency(currency);
        let stock = StockLedger::new(Arc::clone(&db), Arc::clone(&audit));
        let builder = TransactionBuilder::new(Arc::clone(&db), audit);

        AppState {
            db,
            settlement,
            stock,
            builder,
        }
    }
}
