//! Message, feedback, parameter and conversation calls proxied to the
//! chat service behind an app.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chatportal_core::access::{self, AccessRequest, AppAccess};
use chatportal_core::AppState;
use chatportal_models::identity::Identity;
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::{client_ip, session_id, MaybeUser};

async fn grant(
    state: &AppState,
    identity: Option<&Identity>,
    headers: &HeaderMap,
    app_id: i64,
    counts_message: bool,
) -> Result<AppAccess, ApiError> {
    let ip = client_ip(headers);
    let session = session_id(headers);
    let granted = access::authorize_app_access(
        &state.db,
        app_id,
        AccessRequest {
            identity,
            session_id: session.as_deref(),
            client_ip: &ip,
            counts_message,
        },
    )
    .await?;
    Ok(granted)
}

pub async fn send_message(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    headers: HeaderMap,
    Path(app_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let granted = grant(&state, identity.as_ref(), &headers, app_id, true).await?;
    let reply = state.chat.send_message(&granted, body).await?;
    chatportal_core::usage::record_message(
        &state.db,
        granted.app.id,
        granted.anonymous_session().map(str::to_string),
    );
    Ok(Json(reply))
}

pub async fn send_feedback(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    headers: HeaderMap,
    Path((app_id, message_id)): Path<(i64, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let granted = grant(&state, identity.as_ref(), &headers, app_id, false).await?;
    let reply = state.chat.send_feedback(&granted, &message_id, body).await?;
    Ok(Json(reply))
}

pub async fn parameters(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    headers: HeaderMap,
    Path(app_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let granted = grant(&state, identity.as_ref(), &headers, app_id, false).await?;
    Ok(Json(state.chat.parameters(&granted).await?))
}

pub async fn rename_conversation(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    headers: HeaderMap,
    Path((app_id, conversation_id)): Path<(i64, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let granted = grant(&state, identity.as_ref(), &headers, app_id, false).await?;
    let reply = state
        .chat
        .rename_conversation(&granted, &conversation_id, body)
        .await?;
    Ok(Json(reply))
}
