use crate::entities::audit_log_entity as audit;
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Upper bound on entries held for retry. The oldest batches are dropped first.
pub const MAX_PENDING_AUDIT_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub event_id: Option<i64>,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub action: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Collects audit entries for one request or job and writes them in a
/// single insert. Entries survive a failed flush and go out with the next one.
#[derive(Debug)]
pub struct AuditLogBuffer {
    batch_id: String,
    entries: Vec<AuditEntry>,
}

impl Default for AuditLogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogBuffer {
    pub fn new() -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            entries: Vec::new(),
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn push(
        &mut self,
        event_id: Option<i64>,
        entity_type: &str,
        entity_id: Option<i64>,
        action: &str,
        data: Value,
    ) {
        self.entries.push(AuditEntry {
            event_id,
            entity_type: entity_type.to_string(),
            entity_id,
            action: action.to_string(),
            data,
            created_at: Utc::now(),
        });
    }

    /// Writes every buffered entry. Returns how many were written.
    pub async fn flush<C: ConnectionTrait>(&mut self, db: &C) -> AppResult<usize> {
        if self.entries.is_empty() {
            return Ok(0);
        }

        let pending = std::mem::take(&mut self.entries);
        let rows = pending.iter().map(|e| audit::ActiveModel {
            batch_id: Set(self.batch_id.clone()),
            event_id: Set(e.event_id),
            entity_type: Set(e.entity_type.clone()),
            entity_id: Set(e.entity_id),
            action: Set(e.action.clone()),
            data: Set(Some(e.data.to_string())),
            created_at: Set(e.created_at),
            ..Default::default()
        });

        match audit::Entity::insert_many(rows).exec(db).await {
            Ok(_) => Ok(pending.len()),
            Err(e) => {
                let mut restored = pending;
                restored.append(&mut self.entries);
                self.entries = restored;
                Err(e.into())
            }
        }
    }
}

/// Writes request buffers and keeps the ones whose write failed until a
/// later retry succeeds.
#[derive(Clone)]
pub struct AuditLogService {
    pool: DatabaseConnection,
    pending: Arc<Mutex<VecDeque<AuditLogBuffer>>>,
}

impl AuditLogService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self {
            pool,
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Flush at the end of a request. A failed buffer is queued for retry.
    pub async fn submit(&self, mut buffer: AuditLogBuffer) {
        if let Err(e) = buffer.flush(&self.pool).await {
            log::warn!(
                "Failed to write {} audit entries (batch {}), queued for retry: {e}",
                buffer.len(),
                buffer.batch_id()
            );
            self.enqueue(buffer).await;
        }
    }

    async fn enqueue(&self, buffer: AuditLogBuffer) {
        let mut pending = self.pending.lock().await;
        pending.push_back(buffer);
        let mut queued: usize = pending.iter().map(AuditLogBuffer::len).sum();
        while queued > MAX_PENDING_AUDIT_ENTRIES && pending.len() > 1 {
            if let Some(dropped) = pending.pop_front() {
                queued -= dropped.len();
                log::error!(
                    "Audit retry queue full, dropping {} entries (batch {})",
                    dropped.len(),
                    dropped.batch_id()
                );
            }
        }
    }

    /// Entries waiting for a retry.
    pub async fn pending_entries(&self) -> usize {
        self.pending.lock().await.iter().map(AuditLogBuffer::len).sum()
    }

    /// Retries queued buffers in order and stops at the first failure.
    /// Returns how many entries were written.
    pub async fn retry_pending(&self) -> AppResult<usize> {
        let mut pending = self.pending.lock().await;
        let mut written = 0;
        while let Some(buffer) = pending.front_mut() {
            written += buffer.flush(&self.pool).await?;
            pending.pop_front();
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use sea_orm::{ConnectionTrait, PaginatorTrait};
    use serde_json::json;

    #[tokio::test]
    async fn flush_writes_one_batch() {
        let db = setup_db().await;
        let mut buffer = AuditLogBuffer::new();
        assert_eq!(buffer.flush(&db).await.unwrap(), 0);

        buffer.push(Some(1), "registration", Some(7), "registration.created", json!({}));
        buffer.push(Some(1), "registration", Some(7), "registration.finalized", json!({"finalized": true}));
        assert_eq!(buffer.flush(&db).await.unwrap(), 2);
        assert!(buffer.is_empty());

        let rows = audit::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.batch_id == buffer.batch_id()));
    }

    #[tokio::test]
    async fn failed_flush_keeps_entries() {
        let db = setup_db().await;
        db.execute_unprepared("DROP TABLE audit_logs").await.unwrap();

        let mut buffer = AuditLogBuffer::new();
        buffer.push(None, "coupon", Some(3), "coupon.deleted", json!({}));
        assert!(buffer.flush(&db).await.is_err());
        assert_eq!(buffer.len(), 1);

        recreate_audit_table(&db).await;
        assert_eq!(buffer.flush(&db).await.unwrap(), 1);
        assert_eq!(audit::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_request_flush_is_retried_later() {
        let db = setup_db().await;
        let service = AuditLogService::new(db.clone());
        db.execute_unprepared("DROP TABLE audit_logs").await.unwrap();

        let mut buffer = AuditLogBuffer::new();
        buffer.push(Some(1), "registration", Some(7), "registration.finalized", json!({}));
        buffer.push(None, "coupon", Some(3), "coupon.created", json!({"code": "SAVE"}));
        let batch_id = buffer.batch_id().to_string();
        service.submit(buffer).await;
        assert_eq!(service.pending_entries().await, 2);

        assert!(service.retry_pending().await.is_err());
        assert_eq!(service.pending_entries().await, 2);

        recreate_audit_table(&db).await;
        assert_eq!(service.retry_pending().await.unwrap(), 2);
        assert_eq!(service.pending_entries().await, 0);

        let rows = audit::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.batch_id == batch_id));
    }

    #[tokio::test]
    async fn successful_submit_queues_nothing() {
        let db = setup_db().await;
        let service = AuditLogService::new(db.clone());
        let mut buffer = AuditLogBuffer::new();
        buffer.push(Some(1), "coupon", Some(3), "coupon.deleted", json!({}));

        service.submit(buffer).await;
        assert_eq!(service.pending_entries().await, 0);
        assert_eq!(audit::Entity::find().count(&db).await.unwrap(), 1);
    }
}
