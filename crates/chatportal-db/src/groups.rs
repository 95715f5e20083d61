use crate::{bool_from_any_row, datetime_from_row, DbError, DbPool};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for GroupRow {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            is_active: bool_from_any_row(row, "is_active")?,
            member_count: row.try_get("member_count")?,
            created_at: datetime_from_row(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupMemberRow {
    pub group_id: i64,
    pub admin_id: i64,
    pub group_role: String,
    pub login_id: String,
    pub name: String,
}

const GROUP_SELECT: &str = "SELECT g.id, g.name, g.description, g.is_active, g.created_at,
        (SELECT COUNT(*) FROM admin_group_members m WHERE m.group_id = g.id) AS member_count
     FROM admin_groups g";

pub async fn create_group(
    pool: &DbPool,
    id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<GroupRow, DbError> {
    sqlx::query("INSERT INTO admin_groups (id, name, description) VALUES (?1, ?2, ?3)")
        .bind(id)
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;
    get_group(pool, id).await?.ok_or(DbError::NotFound)
}

pub async fn get_group(pool: &DbPool, id: i64) -> Result<Option<GroupRow>, DbError> {
    let sql = format!("{GROUP_SELECT} WHERE g.id = ?1");
    let row = sqlx::query_as::<_, GroupRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_groups(pool: &DbPool) -> Result<Vec<GroupRow>, DbError> {
    let sql = format!("{GROUP_SELECT} ORDER BY g.name ASC");
    let rows = sqlx::query_as::<_, GroupRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn update_group(
    pool: &DbPool,
    id: i64,
    name: Option<&str>,
    description: Option<&str>,
    is_active: Option<bool>,
) -> Result<GroupRow, DbError> {
    let result = sqlx::query(
        "UPDATE admin_groups SET
             name = COALESCE(?2, name),
             description = COALESCE(?3, description),
             is_active = COALESCE(?4, is_active)
         WHERE id = ?1",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(is_active)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    get_group(pool, id).await?.ok_or(DbError::NotFound)
}

/// Memberships and app links go with the group (ON DELETE CASCADE).
pub async fn delete_group(pool: &DbPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM admin_groups WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

pub async fn list_members(pool: &DbPool, group_id: i64) -> Result<Vec<GroupMemberRow>, DbError> {
    let rows = sqlx::query_as::<_, GroupMemberRow>(
        "SELECT m.group_id, m.admin_id, m.group_role, a.login_id, a.name
         FROM admin_group_members m JOIN admins a ON a.id = m.admin_id
         WHERE m.group_id = ?1
         ORDER BY a.login_id ASC",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// The group an admin currently belongs to, with their role in it.
pub async fn get_membership(
    pool: &DbPool,
    admin_id: i64,
) -> Result<Option<(i64, String)>, DbError> {
    let row: Option<(i64, String)> = sqlx::query_as(
        "SELECT group_id, group_role FROM admin_group_members WHERE admin_id = ?1",
    )
    .bind(admin_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Inserts the membership, or updates the role when the admin is already
/// in this same group. A row in a different group is left untouched and
/// reported as zero rows affected.
pub async fn upsert_member(
    pool: &DbPool,
    group_id: i64,
    admin_id: i64,
    group_role: &str,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "INSERT INTO admin_group_members (admin_id, group_id, group_role) VALUES (?1, ?2, ?3)
         ON CONFLICT (admin_id) DO UPDATE SET group_role = excluded.group_role
         WHERE admin_group_members.group_id = excluded.group_id",
    )
    .bind(admin_id)
    .bind(group_id)
    .bind(group_role)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn remove_member(pool: &DbPool, group_id: i64, admin_id: i64) -> Result<bool, DbError> {
    let result =
        sqlx::query("DELETE FROM admin_group_members WHERE group_id = ?1 AND admin_id = ?2")
            .bind(group_id)
            .bind(admin_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_group_app_ids(pool: &DbPool, group_id: i64) -> Result<Vec<i64>, DbError> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT app_id FROM group_apps WHERE group_id = ?1 ORDER BY app_id")
            .bind(group_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Replace the group's app set in one transaction.
pub async fn set_group_apps(pool: &DbPool, group_id: i64, app_ids: &[i64]) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM group_apps WHERE group_id = ?1")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
    for app_id in app_ids {
        sqlx::query("INSERT OR IGNORE INTO group_apps (group_id, app_id) VALUES (?1, ?2)")
            .bind(group_id)
            .bind(*app_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}
