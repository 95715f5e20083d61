use axum::{
    extract::{Query, State},
    http::header,
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chatportal_core::embed::{EmbedError, EmbedParams};
use chatportal_core::legacy::LegacyUser;
use chatportal_core::{AppState, USER_SESSION_SECONDS};
use chatportal_models::identity::Identity;
use chatportal_models::role::Role;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{AuthUser, AUTH_COOKIE_NAME, EMBED_COOKIE_NAME};
use crate::routes::{build_cookie, clear_cookie, header_value};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "loginId")]
    pub login_id: String,
    pub password: String,
}

fn identity_json(identity: &Identity) -> Value {
    json!({
        "login_id": identity.login_id,
        "employee_number": identity.employee_number,
        "name": identity.display_name,
        "role": identity.role,
    })
}

fn legacy_user_json(user: &LegacyUser) -> Value {
    json!({
        "login_id": user.login_id,
        "employee_number": user.employee_number,
        "name": user.name,
        "department": user.department,
        "role": user.role,
    })
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let login_id = body.login_id.trim();
    if login_id.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Login ID and password are required".into(),
        ));
    }

    let result = state.legacy_auth.authenticate(login_id, &body.password).await;
    let user = match (result.success, result.data) {
        (true, Some(user)) => user,
        _ => {
            tracing::info!(login_id, "portal login rejected");
            return Err(ApiError::Unauthorized(
                result
                    .error
                    .unwrap_or_else(|| "Invalid login ID or password".into()),
            ));
        }
    };

    let identity = Identity {
        login_id: user.login_id.clone(),
        employee_number: user.employee_number.clone(),
        display_name: user.name.clone(),
        role: user.role,
    };
    let token = state.tokens.sign(&identity)?;
    let cookie = build_cookie(
        AUTH_COOKIE_NAME,
        &token,
        USER_SESSION_SECONDS,
        state.config.secure_cookies,
    );

    Ok((
        AppendHeaders([(header::SET_COOKIE, header_value(&cookie)?)]),
        Json(json!({ "token": token, "user": legacy_user_json(&user) })),
    ))
}

pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let secure = state.config.secure_cookies;
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, header_value(&clear_cookie(AUTH_COOKIE_NAME, secure))?),
            (header::SET_COOKIE, header_value(&clear_cookie(EMBED_COOKIE_NAME, secure))?),
        ]),
        Json(json!({ "success": true })),
    ))
}

pub async fn me(AuthUser(identity): AuthUser) -> Json<Value> {
    Json(json!({ "user": identity_json(&identity) }))
}

pub async fn password_policy() -> Json<Value> {
    Json(json!({
        "rules": chatportal_util::validation::describe_password_policy(),
        "min_length": chatportal_util::validation::PASSWORD_MIN_LEN,
        "max_length": chatportal_util::validation::PASSWORD_MAX_LEN,
        "special_chars": chatportal_util::validation::PASSWORD_SPECIAL_CHARS,
    }))
}

pub async fn embed_from_query(
    State(state): State<AppState>,
    Query(params): Query<EmbedParams>,
) -> Result<impl IntoResponse, ApiError> {
    start_embed_session(&state, &params)
}

pub async fn embed_from_body(
    State(state): State<AppState>,
    Json(params): Json<EmbedParams>,
) -> Result<impl IntoResponse, ApiError> {
    start_embed_session(&state, &params)
}

/// Verify signed launch parameters and hand out an embed session cookie.
fn start_embed_session(
    state: &AppState,
    params: &EmbedParams,
) -> Result<impl IntoResponse, ApiError> {
    let verified = state.embed.verify(params).map_err(|err| {
        tracing::info!("embed launch rejected: {err}");
        match err {
            EmbedError::MissingParameters | EmbedError::InvalidTimestamp => {
                ApiError::BadRequest(err.to_string())
            }
            EmbedError::TimestampExpired | EmbedError::InvalidSignature => {
                ApiError::Unauthorized(err.to_string())
            }
        }
    })?;

    let identity = Identity {
        login_id: verified.login_id,
        employee_number: verified.emp_no,
        display_name: verified.name,
        role: Role::User,
    };
    let token = state.tokens.sign(&identity)?;
    let cookie = build_cookie(
        EMBED_COOKIE_NAME,
        &token,
        state.tokens.expiry_seconds(),
        state.config.secure_cookies,
    );

    Ok((
        AppendHeaders([(header::SET_COOKIE, header_value(&cookie)?)]),
        Json(json!({ "success": true, "user": identity_json(&identity) })),
    ))
}
