use crate::error::Result;
use crate::models::audit_log::AuditLog;
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};

#[derive(Clone)]
pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn for_entity(&self, entity_type: &str, entity_id: i64) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLog>(
            r#"SELECT id, user_id, action, entity_type, entity_id, changes, created_at
               FROM audit_logs
               WHERE entity_type = $1 AND entity_id = $2
               ORDER BY id"#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Writes an audit row on the caller's connection so it commits or rolls
/// back together with the change it describes.
pub async fn record(
    conn: &mut PgConnection,
    user_id: Option<i64>,
    action: &str,
    entity_type: &str,
    entity_id: i64,
    changes: Option<JsonValue>,
) -> Result<AuditLog> {
    let row = sqlx::query_as::<_, AuditLog>(
        r#"
        INSERT INTO audit_logs (user_id, action, entity_type, entity_id, changes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, action, entity_type, entity_id, changes, created_at
        "#,
    )
    .bind(user_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(changes)
    .fetch_one(conn)
    .await?;
    Ok(row)
}
