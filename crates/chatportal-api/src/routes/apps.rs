use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chatportal_core::access::{self, AccessRequest};
use chatportal_core::AppState;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{client_ip, session_id, MaybeUser};
use crate::routes::public_app_json;

pub async fn list_apps(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
) -> Result<Json<Value>, ApiError> {
    let apps = chatportal_db::apps::list_active_apps(&state.db).await?;
    let visible: Vec<Value> = apps
        .iter()
        .filter(|app| access::listed_for(app, identity.as_ref()))
        .map(public_app_json)
        .collect();
    Ok(Json(json!({
        "apps": visible,
        "authenticated": identity.is_some(),
    })))
}

pub async fn get_app(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    headers: HeaderMap,
    Path(app_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let ip = client_ip(&headers);
    let session = session_id(&headers);
    let granted = access::authorize_app_access(
        &state.db,
        app_id,
        AccessRequest {
            identity: identity.as_ref(),
            session_id: session.as_deref(),
            client_ip: &ip,
            counts_message: false,
        },
    )
    .await?;

    let mut body = public_app_json(&granted.app);
    if let Some(session) = granted.anonymous_session() {
        let used =
            chatportal_db::usage::get_anonymous_count(&state.db, granted.app.id, session).await?;
        body["anonymous_messages_used"] = json!(used);
    }
    Ok(Json(body))
}
