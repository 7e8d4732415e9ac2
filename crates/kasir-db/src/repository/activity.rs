//! # Activity Repository
//!
//! Append-only audit log. Entries arrive through the outbox worker, so a
//! failing audit write never blocks a sale.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kasir_core::{ActivityEntry, ActivityLog};

/// Repository for audit log operations.
#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ActivityRepository { pool }
    }

    /// Persists an audit entry. JSON snapshots are stored as text.
    pub async fn insert(&self, entry: &ActivityEntry) -> DbResult<ActivityLog> {
        let log = ActivityLog {
            id: Uuid::new_v4().to_string(),
            tenant_id: entry.tenant_id.clone(),
            user_id: entry.user_id.clone(),
            action: entry.action.clone(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id.clone(),
            old_value: entry.old_value.as_ref().map(serde_json::to_string).transpose()?,
            new_value: entry.new_value.as_ref().map(serde_json::to_string).transpose()?,
            reason: entry.reason.clone(),
            outlet_id: entry.outlet_id.clone(),
            created_at: Utc::now(),
        };

        debug!(action = %log.action, entity_id = %log.entity_id, "Recording activity");

        sqlx::query(
            r#"
            INSERT INTO activity_logs (
                id, tenant_id, user_id, action, entity_type, entity_id,
                old_value, new_value, reason, outlet_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&log.id)
        .bind(&log.tenant_id)
        .bind(&log.user_id)
        .bind(&log.action)
        .bind(&log.entity_type)
        .bind(&log.entity_id)
        .bind(&log.old_value)
        .bind(&log.new_value)
        .bind(&log.reason)
        .bind(&log.outlet_id)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(log)
    }

    /// Audit trail of one entity, oldest first.
    pub async fn list_for_entity(&self, entity_type: &str, entity_id: &str) -> DbResult<Vec<ActivityLog>> {
        let logs = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, tenant_id, user_id, action, entity_type, entity_id,
                   old_value, new_value, reason, outlet_id, created_at
            FROM activity_logs
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY rowid
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.activity();

        let entry = ActivityEntry {
            tenant_id: "t1".to_string(),
            user_id: "u1".to_string(),
            action: "UPDATE_TRANSACTION_STATUS".to_string(),
            entity_type: "transaction".to_string(),
            entity_id: "trx-1".to_string(),
            old_value: Some(json!({ "status": "completed" })),
            new_value: Some(json!({ "status": "cancelled" })),
            reason: Some("customer left".to_string()),
            outlet_id: Some("o1".to_string()),
        };
        repo.insert(&entry).await.unwrap();

        let logs = repo.list_for_entity("transaction", "trx-1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].reason.as_deref(), Some("customer left"));

        let old: serde_json::Value = serde_json::from_str(logs[0].old_value.as_deref().unwrap()).unwrap();
        assert_eq!(old["status"], "completed");

        assert!(repo.list_for_entity("transaction", "other").await.unwrap().is_empty());
    }
}
