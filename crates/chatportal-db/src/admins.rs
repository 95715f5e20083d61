use crate::{
    bool_from_any_row, datetime_from_row, datetime_to_db_text, optional_datetime_from_row,
    DbError, DbPool,
};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct AdminRow {
    pub id: i64,
    pub login_id: String,
    pub password_hash: String,
    pub name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub login_attempts: i64,
    pub locked_until: Option<DateTime<Utc>>,
    pub group_id: Option<i64>,
    pub group_role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminRow {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

impl<'r> sqlx::FromRow<'r, AnyRow> for AdminRow {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            login_id: row.try_get("login_id")?,
            password_hash: row.try_get("password_hash")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            department: row.try_get("department")?,
            role: row.try_get("role")?,
            is_active: bool_from_any_row(row, "is_active")?,
            login_attempts: row.try_get("login_attempts")?,
            locked_until: optional_datetime_from_row(row, "locked_until")?,
            group_id: row.try_get("group_id")?,
            group_role: row.try_get("group_role")?,
            created_at: datetime_from_row(row, "created_at")?,
            updated_at: datetime_from_row(row, "updated_at")?,
        })
    }
}

const ADMIN_SELECT: &str = "SELECT a.id, a.login_id, a.password_hash, a.name, a.email, a.department, a.role,
        a.is_active, a.login_attempts, a.locked_until, m.group_id, m.group_role, a.created_at, a.updated_at
     FROM admins a LEFT JOIN admin_group_members m ON m.admin_id = a.id";

pub struct NewAdmin<'a> {
    pub id: i64,
    pub login_id: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub department: Option<&'a str>,
    pub role: &'a str,
}

pub async fn create_admin(pool: &DbPool, admin: &NewAdmin<'_>) -> Result<AdminRow, DbError> {
    sqlx::query(
        "INSERT INTO admins (id, login_id, password_hash, name, email, department, role)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(admin.id)
    .bind(admin.login_id)
    .bind(admin.password_hash)
    .bind(admin.name)
    .bind(admin.email)
    .bind(admin.department)
    .bind(admin.role)
    .execute(pool)
    .await?;
    get_admin_by_id(pool, admin.id)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn get_admin_by_id(pool: &DbPool, id: i64) -> Result<Option<AdminRow>, DbError> {
    let sql = format!("{ADMIN_SELECT} WHERE a.id = ?1");
    let row = sqlx::query_as::<_, AdminRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn get_admin_by_login_id(
    pool: &DbPool,
    login_id: &str,
) -> Result<Option<AdminRow>, DbError> {
    let sql = format!("{ADMIN_SELECT} WHERE a.login_id = ?1");
    let row = sqlx::query_as::<_, AdminRow>(&sql)
        .bind(login_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_admins_paginated(
    pool: &DbPool,
    offset: i64,
    limit: i64,
) -> Result<Vec<AdminRow>, DbError> {
    let sql = format!("{ADMIN_SELECT} ORDER BY a.id ASC LIMIT ?1 OFFSET ?2");
    let rows = sqlx::query_as::<_, AdminRow>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn count_admins(pool: &DbPool) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// `None` leaves a column untouched.
pub async fn update_admin_profile(
    pool: &DbPool,
    id: i64,
    name: Option<&str>,
    email: Option<&str>,
    department: Option<&str>,
) -> Result<AdminRow, DbError> {
    let now = datetime_to_db_text(Utc::now());
    let result = sqlx::query(
        "UPDATE admins SET
             name = COALESCE(?2, name),
             email = COALESCE(?3, email),
             department = COALESCE(?4, department),
             updated_at = ?5
         WHERE id = ?1",
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(department)
    .bind(now)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    get_admin_by_id(pool, id).await?.ok_or(DbError::NotFound)
}

pub async fn update_admin_access(
    pool: &DbPool,
    id: i64,
    role: Option<&str>,
    is_active: Option<bool>,
) -> Result<AdminRow, DbError> {
    let now = datetime_to_db_text(Utc::now());
    let result = sqlx::query(
        "UPDATE admins SET
             role = COALESCE(?2, role),
             is_active = COALESCE(?3, is_active),
             updated_at = ?4
         WHERE id = ?1",
    )
    .bind(id)
    .bind(role)
    .bind(is_active)
    .bind(now)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    get_admin_by_id(pool, id).await?.ok_or(DbError::NotFound)
}

pub async fn update_password_hash(
    pool: &DbPool,
    id: i64,
    password_hash: &str,
) -> Result<(), DbError> {
    let now = datetime_to_db_text(Utc::now());
    let result = sqlx::query("UPDATE admins SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(password_hash)
        .bind(now)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Counter state after a failed sign-in.
#[derive(Debug, Clone, Copy)]
pub struct FailedLogin {
    pub attempts: i64,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Bumps the failure counter in a single statement so concurrent failures
/// never lose an increment. An expired lock restarts the count at one; a
/// lock still in force is left untouched.
pub async fn record_failed_login(
    pool: &DbPool,
    id: i64,
    max_attempts: i64,
    lock_until: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<FailedLogin, DbError> {
    let row = sqlx::query(
        "UPDATE admins SET
            login_attempts = CASE
                WHEN locked_until IS NOT NULL AND locked_until <= ?4 THEN 1
                ELSE login_attempts + 1
            END,
            locked_until = CASE
                WHEN locked_until IS NOT NULL AND locked_until > ?4 THEN locked_until
                WHEN (CASE
                        WHEN locked_until IS NOT NULL AND locked_until <= ?4 THEN 1
                        ELSE login_attempts + 1
                      END) >= ?2 THEN ?3
                ELSE NULL
            END
         WHERE id = ?1
         RETURNING login_attempts, locked_until",
    )
    .bind(id)
    .bind(max_attempts)
    .bind(datetime_to_db_text(lock_until))
    .bind(datetime_to_db_text(now))
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(FailedLogin {
        attempts: row.try_get("login_attempts")?,
        locked_until: optional_datetime_from_row(&row, "locked_until")?,
    })
}

/// Clears the failure counter and any lock.
pub async fn reset_login_state(pool: &DbPool, id: i64) -> Result<(), DbError> {
    let result =
        sqlx::query("UPDATE admins SET login_attempts = 0, locked_until = NULL WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

pub async fn delete_admin(pool: &DbPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM admins WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
