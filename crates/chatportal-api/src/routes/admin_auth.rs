use axum::{
    extract::State,
    http::header,
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chatportal_core::audit::AuditEntry;
use chatportal_core::AppState;
use chatportal_models::audit_log::{ActorType, ACTION_ADMIN_LOGIN, ACTION_ADMIN_UPDATE, ACTION_PASSWORD_CHANGE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{AdminUser, ClientMeta, ADMIN_COOKIE_NAME};
use crate::routes::{admin_json, build_cookie, clear_cookie, header_value};

#[derive(Deserialize)]
pub struct AdminLoginRequest {
    #[serde(alias = "loginId")]
    pub login_id: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(body): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let login_id = body.login_id.trim();
    let result = chatportal_core::admin::login(
        &state.db,
        &state.tokens,
        &state.config,
        login_id,
        &body.password,
    )
    .await;

    let session = match result {
        Ok(session) => session,
        Err(err) => {
            state.audit.log(
                AuditEntry::new(login_id, ActorType::Admin, ACTION_ADMIN_LOGIN, "admin", meta)
                    .changes(None, Some(json!({ "reason": err.to_string() })))
                    .failed(),
            );
            return Err(err.into());
        }
    };

    state.audit.log(
        AuditEntry::new(
            session.admin.login_id.clone(),
            ActorType::Admin,
            ACTION_ADMIN_LOGIN,
            "admin",
            meta,
        )
        .entity(session.admin.id),
    );

    let cookie = build_cookie(
        ADMIN_COOKIE_NAME,
        &session.token,
        state.tokens.expiry_seconds(),
        state.config.secure_cookies,
    );
    Ok((
        AppendHeaders([(header::SET_COOKIE, header_value(&cookie)?)]),
        Json(json!({
            "token": session.token,
            "admin": {
                "id": session.admin.id.to_string(),
                "login_id": session.admin.login_id,
                "name": session.admin.name,
                "role": session.admin.role,
                "group_id": session.admin.group_id.map(|id| id.to_string()),
            },
        })),
    ))
}

pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cookie = clear_cookie(ADMIN_COOKIE_NAME, state.config.secure_cookies);
    Ok((
        AppendHeaders([(header::SET_COOKIE, header_value(&cookie)?)]),
        Json(json!({ "success": true })),
    ))
}

pub async fn get_me(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Value>, ApiError> {
    let row = chatportal_db::admins::get_admin_by_id(&state.db, admin.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let visible = chatportal_core::authz::visible_app_ids(&state.db, &admin).await?;
    let mut body = admin_json(&row);
    body["visible_app_ids"] = match visible {
        Some(ids) => json!(ids.iter().map(i64::to_string).collect::<Vec<_>>()),
        None => Value::Null,
    };
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
}

pub async fn update_me(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientMeta(meta): ClientMeta,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(name) = body.name.as_deref() {
        chatportal_util::validation::validate_display_name(name)
            .map_err(|e| ApiError::BadRequest(format!("name: {e}")))?;
    }
    if let Some(email) = body.email.as_deref() {
        chatportal_util::validation::validate_email(email)
            .map_err(|e| ApiError::BadRequest(format!("email: {e}")))?;
    }

    let before = chatportal_db::admins::get_admin_by_id(&state.db, admin.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let updated = chatportal_db::admins::update_admin_profile(
        &state.db,
        admin.id,
        body.name.as_deref().map(str::trim),
        body.email.as_deref(),
        body.department.as_deref(),
    )
    .await?;

    state.audit.log(
        AuditEntry::new(admin.login_id.clone(), ActorType::Admin, ACTION_ADMIN_UPDATE, "admin", meta)
            .entity(admin.id)
            .changes(
                Some(json!({ "name": before.name, "email": before.email, "department": before.department })),
                Some(json!({ "name": updated.name, "email": updated.email, "department": updated.department })),
            ),
    );
    Ok(Json(admin_json(&updated)))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub current_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientMeta(meta): ClientMeta,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = chatportal_core::admin::change_password(
        &state.db,
        admin.id,
        &body.current_password,
        &body.new_password,
    )
    .await;

    let entry = AuditEntry::new(
        admin.login_id.clone(),
        ActorType::Admin,
        ACTION_PASSWORD_CHANGE,
        "admin",
        meta,
    )
    .entity(admin.id);
    match result {
        Ok(()) => {
            state.audit.log(entry);
            Ok(Json(json!({ "success": true })))
        }
        Err(err) => {
            state.audit.log(entry.failed());
            Err(err.into())
        }
    }
}
