//! # Audit Repository
//!
//! Append-only audit log. Rows are written after the mutation they describe
//! has committed; a failed audit write is logged and swallowed upstream so
//! it never rolls back a settlement.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::AuditEntry;

/// Repository for audit log operations.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

const AUDIT_COLUMNS: &str = "id, action, actor, resource_name, resource_id, details, created_at";

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Appends an audit entry.
    pub async fn insert(&self, entry: &AuditEntry) -> DbResult<()> {
        debug!(action = %entry.action, resource = %entry.resource_name, "Appending audit entry");

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, action, actor, resource_name, resource_id, details, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.action)
        .bind(&entry.actor)
        .bind(&entry.resource_name)
        .bind(&entry.resource_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists audit entries, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
