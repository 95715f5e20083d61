use crate::{datetime_to_db_text, in_placeholders, DbError, DbPool};
use chrono::Utc;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsageStatRow {
    pub app_id: i64,
    pub app_name: String,
    pub day: String,
    pub user_messages: i64,
    pub anonymous_messages: i64,
}

pub async fn get_anonymous_count(
    pool: &DbPool,
    app_id: i64,
    session_id: &str,
) -> Result<i64, DbError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT message_count FROM anonymous_usage WHERE app_id = ?1 AND session_id = ?2",
    )
    .bind(app_id)
    .bind(session_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0).unwrap_or(0))
}

pub async fn increment_anonymous_count(
    pool: &DbPool,
    app_id: i64,
    session_id: &str,
) -> Result<(), DbError> {
    let now = datetime_to_db_text(Utc::now());
    sqlx::query(
        "INSERT INTO anonymous_usage (app_id, session_id, message_count, updated_at)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT (app_id, session_id)
         DO UPDATE SET message_count = message_count + 1, updated_at = ?3",
    )
    .bind(app_id)
    .bind(session_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Bump today's counter for an app. `day` is `YYYY-MM-DD`.
pub async fn increment_daily_usage(
    pool: &DbPool,
    app_id: i64,
    day: &str,
    anonymous: bool,
) -> Result<(), DbError> {
    let (user_inc, anon_inc): (i64, i64) = if anonymous { (0, 1) } else { (1, 0) };
    sqlx::query(
        "INSERT INTO usage_stats (app_id, day, user_messages, anonymous_messages)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (app_id, day) DO UPDATE SET
             user_messages = user_messages + ?3,
             anonymous_messages = anonymous_messages + ?4",
    )
    .bind(app_id)
    .bind(day)
    .bind(user_inc)
    .bind(anon_inc)
    .execute(pool)
    .await?;
    Ok(())
}

/// Daily rows between `from` and `to` (inclusive), optionally restricted
/// to a set of app ids.
pub async fn list_usage(
    pool: &DbPool,
    from: &str,
    to: &str,
    only: Option<&[i64]>,
) -> Result<Vec<UsageStatRow>, DbError> {
    let base = "SELECT s.app_id, a.name AS app_name, s.day, s.user_messages, s.anonymous_messages
         FROM usage_stats s JOIN apps a ON a.id = s.app_id
         WHERE s.day >= ?1 AND s.day <= ?2";
    match only {
        None => {
            let sql = format!("{base} ORDER BY s.day ASC, a.name ASC");
            let rows = sqlx::query_as::<_, UsageStatRow>(&sql)
                .bind(from)
                .bind(to)
                .fetch_all(pool)
                .await?;
            Ok(rows)
        }
        Some([]) => Ok(Vec::new()),
        Some(ids) => {
            let sql = format!(
                "{base} AND s.app_id IN ({}) ORDER BY s.day ASC, a.name ASC",
                in_placeholders(3, ids.len())
            );
            let mut query = sqlx::query_as::<_, UsageStatRow>(&sql).bind(from).bind(to);
            for id in ids {
                query = query.bind(*id);
            }
            Ok(query.fetch_all(pool).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::{create_app, NewApp};

    async fn seed_app(pool: &DbPool, id: i64, name: &str) {
        create_app(
            pool,
            &NewApp {
                id,
                name,
                description: None,
                api_url: "http://upstream.invalid",
                api_key: "k",
                is_public: true,
                allow_anonymous: true,
                max_anonymous_msgs: 3,
                allowed_ips: "",
            },
        )
        .await
        .expect("create app");
    }

    #[tokio::test]
    async fn anonymous_counter_starts_at_zero_and_increments() {
        let pool = crate::test_pool().await;
        seed_app(&pool, 1, "alpha").await;
        assert_eq!(get_anonymous_count(&pool, 1, "s-1").await.expect("count"), 0);
        increment_anonymous_count(&pool, 1, "s-1").await.expect("inc");
        increment_anonymous_count(&pool, 1, "s-1").await.expect("inc");
        assert_eq!(get_anonymous_count(&pool, 1, "s-1").await.expect("count"), 2);
        assert_eq!(get_anonymous_count(&pool, 1, "s-2").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn usage_is_split_by_kind_and_filtered_by_app() {
        let pool = crate::test_pool().await;
        seed_app(&pool, 1, "alpha").await;
        seed_app(&pool, 2, "beta").await;
        increment_daily_usage(&pool, 1, "2025-05-01", false).await.expect("inc");
        increment_daily_usage(&pool, 1, "2025-05-01", true).await.expect("inc");
        increment_daily_usage(&pool, 1, "2025-05-01", true).await.expect("inc");
        increment_daily_usage(&pool, 2, "2025-05-02", false).await.expect("inc");

        let all = list_usage(&pool, "2025-05-01", "2025-05-31", None).await.expect("all");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_messages, 1);
        assert_eq!(all[0].anonymous_messages, 2);

        let only_beta = list_usage(&pool, "2025-05-01", "2025-05-31", Some(&[2]))
            .await
            .expect("beta");
        assert_eq!(only_beta.len(), 1);
        assert_eq!(only_beta[0].app_name, "beta");
    }
}
