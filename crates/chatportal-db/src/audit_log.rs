use crate::{bool_from_any_row, datetime_from_row, json_from_db_text, DbError, DbPool};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct AuditLogRow {
    pub id: i64,
    pub actor_id: String,
    pub actor_type: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub changes: Option<serde_json::Value>,
    pub success: bool,
    pub ip_address: String,
    pub user_agent: String,
    pub request_path: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for AuditLogRow {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        let changes: Option<String> = row.try_get("changes")?;
        Ok(Self {
            id: row.try_get("id")?,
            actor_id: row.try_get("actor_id")?,
            actor_type: row.try_get("actor_type")?,
            action: row.try_get("action")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            changes: changes.as_deref().map(json_from_db_text).transpose()?,
            success: bool_from_any_row(row, "success")?,
            ip_address: row.try_get("ip_address")?,
            user_agent: row.try_get("user_agent")?,
            request_path: row.try_get("request_path")?,
            created_at: datetime_from_row(row, "created_at")?,
        })
    }
}

pub struct NewAuditLog<'a> {
    pub id: i64,
    pub actor_id: &'a str,
    pub actor_type: &'a str,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<&'a str>,
    pub changes: Option<&'a serde_json::Value>,
    pub success: bool,
    pub ip_address: &'a str,
    pub user_agent: &'a str,
    pub request_path: &'a str,
}

pub async fn create_entry(pool: &DbPool, entry: &NewAuditLog<'_>) -> Result<(), DbError> {
    let changes = entry.changes.map(|v| v.to_string());
    sqlx::query(
        "INSERT INTO audit_logs (id, actor_id, actor_type, action, entity_type, entity_id, changes,
             success, ip_address, user_agent, request_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(entry.id)
    .bind(entry.actor_id)
    .bind(entry.actor_type)
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(changes)
    .bind(entry.success)
    .bind(entry.ip_address)
    .bind(entry.user_agent)
    .bind(entry.request_path)
    .execute(pool)
    .await?;
    Ok(())
}

/// Newest first. Each filter is skipped when `None`.
pub async fn list_entries(
    pool: &DbPool,
    actor_id: Option<&str>,
    action: Option<&str>,
    before: Option<i64>,
    limit: i64,
) -> Result<Vec<AuditLogRow>, DbError> {
    let rows = sqlx::query_as::<_, AuditLogRow>(
        "SELECT id, actor_id, actor_type, action, entity_type, entity_id, changes, success,
             ip_address, user_agent, request_path, created_at
         FROM audit_logs
         WHERE (?1 IS NULL OR actor_id = ?1)
           AND (?2 IS NULL OR action = ?2)
           AND (?3 IS NULL OR id < ?3)
         ORDER BY id DESC LIMIT ?4",
    )
    .bind(actor_id)
    .bind(action)
    .bind(before)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
