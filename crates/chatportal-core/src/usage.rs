use crate::error::CoreError;
use chatportal_db::apps::AppRow;
use chatportal_db::DbPool;

/// Whether an anonymous session has used up its message allowance.
///
/// Read-then-compare: two concurrent sends from the same session can both
/// pass the check.
pub async fn anonymous_limit_reached(
    db: &DbPool,
    app: &AppRow,
    session_id: &str,
) -> Result<bool, CoreError> {
    if app.max_anonymous_msgs <= 0 {
        return Ok(false);
    }
    let used = chatportal_db::usage::get_anonymous_count(db, app.id, session_id).await?;
    Ok(used >= app.max_anonymous_msgs)
}

/// Count one sent message in the background. `anonymous_session` is set
/// for anonymous senders and also bumps their per-session counter.
pub fn record_message(db: &DbPool, app_id: i64, anonymous_session: Option<String>) {
    let db = db.clone();
    tokio::spawn(async move {
        let day = chrono::Utc::now().format("%Y-%m-%d").to_string();
        if let Some(session_id) = &anonymous_session {
            if let Err(err) =
                chatportal_db::usage::increment_anonymous_count(&db, app_id, session_id).await
            {
                tracing::warn!(app_id, "failed to count anonymous message: {err}");
            }
        }
        if let Err(err) =
            chatportal_db::usage::increment_daily_usage(&db, app_id, &day, anonymous_session.is_some())
                .await
        {
            tracing::warn!(app_id, "failed to update usage stats: {err}");
        }
    });
}
