//! # Audit Sink
//!
//! Fire-and-forget audit recording. Settlement and stock flows hand an
//! entry to the sink after their transaction commits; the write happens
//! off the request path and a failed write is logged, never surfaced.
//!
//! ```text
//!   settlement flow ──commit──▶ record_detached(entry)
//!                                   │ tokio::spawn
//!                                   ▼
//!                            AuditSink::record ──▶ audit_log table
//!                                   │ on error
//!                                   ▼
//!                               warn! and drop
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use meridian_core::AuditEntry;
use meridian_db::Database;

/// Destination for audit entries.
///
/// Implementations must swallow their own failures; callers never await
/// or inspect the outcome.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one audit entry.
    async fn record(&self, entry: AuditEntry);
}

/// Database-backed sink writing to the audit_log table.
#[derive(Debug, Clone)]
pub struct DbAuditSink {
    db: Arc<Database>,
}

impl DbAuditSink {
    pub fn new(db: Arc<Database>) -> Self {
        DbAuditSink { db }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.db.audit().insert(&entry).await {
            warn!(
                error = %e,
                action = %entry.action,
                resource = %entry.resource_name,
                "Audit write failed"
            );
        }
    }
}

/// Spawns the record onto the runtime and returns immediately.
pub fn record_detached(sink: &Arc<dyn AuditSink>, entry: AuditEntry) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        sink.record(entry).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_db_sink_persists_entry() {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let sink = DbAuditSink::new(Arc::clone(&db));

        sink.record(AuditEntry::new(
            "payment.cash",
            Some("cashier-1".to_string()),
            "transaction",
            Some("txn-1".to_string()),
            Some(r#"{"total_cents":3400}"#.to_string()),
        ))
        .await;

        let entries = db.audit().recent(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "payment.cash");
        assert_eq!(entries[0].actor.as_deref(), Some("cashier-1"));
    }

    #[tokio::test]
    async fn test_detached_record_does_not_block() {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let sink: Arc<dyn AuditSink> = Arc::new(DbAuditSink::new(Arc::clone(&db)));

        record_detached(
            &sink,
            AuditEntry::new("stock.apply", None, "stock_entry", None, None),
        );

        // Give the spawned write a chance to land.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        // The write may or may not have completed yet; the call itself
        // must not have blocked or panicked. Poll briefly for the row.
        for _ in 0..50 {
            if db.audit().recent(10).await.unwrap().len() == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        panic!("detached audit write never landed");
    }
}
