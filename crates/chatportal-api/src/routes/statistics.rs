use axum::{
    extract::{Query, State},
    Json,
};
use chatportal_core::authz;
use chatportal_core::AppState;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::ApiError;
use crate::middleware::AdminUser;

const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Deserialize)]
pub struct StatisticsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn parse_day(raw: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{field} must be YYYY-MM-DD")))
}

pub async fn get_statistics(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(params): Query<StatisticsQuery>,
) -> Result<Json<Value>, ApiError> {
    let to = match params.to.as_deref() {
        Some(raw) => parse_day(raw, "to")?,
        None => Utc::now().date_naive(),
    };
    let from = match params.from.as_deref() {
        Some(raw) => parse_day(raw, "from")?,
        None => to - Duration::days(DEFAULT_WINDOW_DAYS - 1),
    };
    if from > to {
        return Err(ApiError::BadRequest("from must not be after to".into()));
    }
    let from = from.format("%Y-%m-%d").to_string();
    let to = to.format("%Y-%m-%d").to_string();

    let visible = authz::visible_app_ids(&state.db, &admin).await?;
    let rows = chatportal_db::usage::list_usage(&state.db, &from, &to, visible.as_deref()).await?;

    let mut by_app: BTreeMap<i64, (String, i64, i64)> = BTreeMap::new();
    let mut by_day: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for row in &rows {
        let app = by_app
            .entry(row.app_id)
            .or_insert_with(|| (row.app_name.clone(), 0, 0));
        app.1 += row.user_messages;
        app.2 += row.anonymous_messages;
        let day = by_day.entry(row.day.clone()).or_default();
        day.0 += row.user_messages;
        day.1 += row.anonymous_messages;
    }
    let user_total: i64 = rows.iter().map(|r| r.user_messages).sum();
    let anonymous_total: i64 = rows.iter().map(|r| r.anonymous_messages).sum();

    Ok(Json(json!({
        "from": from,
        "to": to,
        "totals": {
            "user_messages": user_total,
            "anonymous_messages": anonymous_total,
            "messages": user_total + anonymous_total,
        },
        "daily": by_day
            .iter()
            .map(|(day, (user, anon))| json!({
                "day": day,
                "user_messages": user,
                "anonymous_messages": anon,
            }))
            .collect::<Vec<_>>(),
        "apps": by_app
            .iter()
            .map(|(id, (name, user, anon))| json!({
                "app_id": id.to_string(),
                "app_name": name,
                "user_messages": user,
                "anonymous_messages": anon,
            }))
            .collect::<Vec<_>>(),
    })))
}
