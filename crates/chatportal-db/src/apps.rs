use crate::{bool_from_any_row, datetime_from_row, datetime_to_db_text, in_placeholders, DbError, DbPool};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct AppRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub api_url: String,
    pub api_key: String,
    pub is_active: bool,
    pub is_public: bool,
    pub allow_anonymous: bool,
    pub max_anonymous_msgs: i64,
    pub allowed_ips: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for AppRow {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            api_url: row.try_get("api_url")?,
            api_key: row.try_get("api_key")?,
            is_active: bool_from_any_row(row, "is_active")?,
            is_public: bool_from_any_row(row, "is_public")?,
            allow_anonymous: bool_from_any_row(row, "allow_anonymous")?,
            max_anonymous_msgs: row.try_get("max_anonymous_msgs")?,
            allowed_ips: row.try_get("allowed_ips")?,
            created_at: datetime_from_row(row, "created_at")?,
            updated_at: datetime_from_row(row, "updated_at")?,
        })
    }
}

const APP_COLUMNS: &str = "id, name, description, api_url, api_key, is_active, is_public,
        allow_anonymous, max_anonymous_msgs, allowed_ips, created_at, updated_at";

pub struct NewApp<'a> {
    pub id: i64,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub api_url: &'a str,
    pub api_key: &'a str,
    pub is_public: bool,
    pub allow_anonymous: bool,
    pub max_anonymous_msgs: i64,
    pub allowed_ips: &'a str,
}

#[derive(Debug, Default)]
pub struct AppUpdate<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub api_url: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
    pub allow_anonymous: Option<bool>,
    pub max_anonymous_msgs: Option<i64>,
    pub allowed_ips: Option<&'a str>,
}

pub async fn create_app(pool: &DbPool, app: &NewApp<'_>) -> Result<AppRow, DbError> {
    sqlx::query(
        "INSERT INTO apps (id, name, description, api_url, api_key, is_public, allow_anonymous,
             max_anonymous_msgs, allowed_ips)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(app.id)
    .bind(app.name)
    .bind(app.description)
    .bind(app.api_url)
    .bind(app.api_key)
    .bind(app.is_public)
    .bind(app.allow_anonymous)
    .bind(app.max_anonymous_msgs)
    .bind(app.allowed_ips)
    .execute(pool)
    .await?;
    get_app(pool, app.id).await?.ok_or(DbError::NotFound)
}

pub async fn get_app(pool: &DbPool, id: i64) -> Result<Option<AppRow>, DbError> {
    let sql = format!("SELECT {APP_COLUMNS} FROM apps WHERE id = ?1");
    let row = sqlx::query_as::<_, AppRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// All apps, or only those whose id is in `only` when given.
pub async fn list_apps(pool: &DbPool, only: Option<&[i64]>) -> Result<Vec<AppRow>, DbError> {
    match only {
        None => {
            let sql = format!("SELECT {APP_COLUMNS} FROM apps ORDER BY name ASC");
            Ok(sqlx::query_as::<_, AppRow>(&sql).fetch_all(pool).await?)
        }
        Some([]) => Ok(Vec::new()),
        Some(ids) => {
            let sql = format!(
                "SELECT {APP_COLUMNS} FROM apps WHERE id IN ({}) ORDER BY name ASC",
                in_placeholders(1, ids.len())
            );
            let mut query = sqlx::query_as::<_, AppRow>(&sql);
            for id in ids {
                query = query.bind(*id);
            }
            Ok(query.fetch_all(pool).await?)
        }
    }
}

pub async fn list_active_apps(pool: &DbPool) -> Result<Vec<AppRow>, DbError> {
    let sql = format!("SELECT {APP_COLUMNS} FROM apps WHERE is_active = 1 ORDER BY name ASC");
    let rows = sqlx::query_as::<_, AppRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn existing_app_ids(pool: &DbPool, ids: &[i64]) -> Result<Vec<i64>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id FROM apps WHERE id IN ({}) ORDER BY id",
        in_placeholders(1, ids.len())
    );
    let mut query = sqlx::query_as::<_, (i64,)>(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

pub async fn update_app(pool: &DbPool, id: i64, update: &AppUpdate<'_>) -> Result<AppRow, DbError> {
    let now = datetime_to_db_text(Utc::now());
    let result = sqlx::query(
        "UPDATE apps SET
             name = COALESCE(?2, name),
             description = COALESCE(?3, description),
             api_url = COALESCE(?4, api_url),
             api_key = COALESCE(?5, api_key),
             is_active = COALESCE(?6, is_active),
             is_public = COALESCE(?7, is_public),
             allow_anonymous = COALESCE(?8, allow_anonymous),
             max_anonymous_msgs = COALESCE(?9, max_anonymous_msgs),
             allowed_ips = COALESCE(?10, allowed_ips),
             updated_at = ?11
         WHERE id = ?1",
    )
    .bind(id)
    .bind(update.name)
    .bind(update.description)
    .bind(update.api_url)
    .bind(update.api_key)
    .bind(update.is_active)
    .bind(update.is_public)
    .bind(update.allow_anonymous)
    .bind(update.max_anonymous_msgs)
    .bind(update.allowed_ips)
    .bind(now)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    get_app(pool, id).await?.ok_or(DbError::NotFound)
}

pub async fn delete_app(pool: &DbPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM apps WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
