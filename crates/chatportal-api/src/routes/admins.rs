use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chatportal_core::admin::NewAdminInput;
use chatportal_core::audit::AuditEntry;
use chatportal_core::AppState;
use chatportal_models::audit_log::{
    ActorType, ACTION_ADMIN_CREATE, ACTION_ADMIN_DELETE, ACTION_ADMIN_UNLOCK, ACTION_ADMIN_UPDATE,
    ACTION_PASSWORD_RESET,
};
use chatportal_models::role::Role;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ClientMeta, SuperAdmin};
use crate::routes::admin_json;

#[derive(Deserialize)]
pub struct ListAdminsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_admins(
    State(state): State<AppState>,
    SuperAdmin(_admin): SuperAdmin,
    Query(params): Query<ListAdminsQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let page = params.page.unwrap_or(1).max(1);
    let admins =
        chatportal_db::admins::list_admins_paginated(&state.db, (page - 1) * limit, limit).await?;
    let total = chatportal_db::admins::count_admins(&state.db).await?;
    Ok(Json(json!({
        "admins": admins.iter().map(admin_json).collect::<Vec<_>>(),
        "total": total,
        "page": page,
        "limit": limit,
    })))
}

#[derive(Deserialize)]
pub struct CreateAdminRequest {
    #[serde(alias = "loginId")]
    pub login_id: String,
    pub password: String,
    pub name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub role: Option<Role>,
}

pub async fn create_admin(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Json(body): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let role = body.role.unwrap_or(Role::Admin);
    if !role.is_admin() {
        return Err(ApiError::BadRequest("role must be admin or super_admin".into()));
    }
    let created = chatportal_core::admin::create_admin(
        &state.db,
        &NewAdminInput {
            login_id: body.login_id.trim(),
            password: &body.password,
            name: &body.name,
            email: body.email.as_deref(),
            department: body.department.as_deref(),
            role,
        },
    )
    .await?;

    let view = admin_json(&created);
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_ADMIN_CREATE, "admin", meta)
            .entity(created.id)
            .changes(None, Some(view.clone())),
    );
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Deserialize)]
pub struct UpdateAdminRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub async fn update_admin(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(admin_id): Path<i64>,
    Json(body): Json<UpdateAdminRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(role) = body.role {
        if !role.is_admin() {
            return Err(ApiError::BadRequest("role must be admin or super_admin".into()));
        }
    }
    if admin_id == actor.id && (body.role.is_some() || body.is_active == Some(false)) {
        return Err(ApiError::BadRequest(
            "Cannot change your own role or deactivate yourself".into(),
        ));
    }
    if let Some(name) = body.name.as_deref() {
        chatportal_util::validation::validate_display_name(name)
            .map_err(|e| ApiError::BadRequest(format!("name: {e}")))?;
    }
    if let Some(email) = body.email.as_deref() {
        chatportal_util::validation::validate_email(email)
            .map_err(|e| ApiError::BadRequest(format!("email: {e}")))?;
    }

    let before = chatportal_db::admins::get_admin_by_id(&state.db, admin_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    chatportal_db::admins::update_admin_profile(
        &state.db,
        admin_id,
        body.name.as_deref().map(str::trim),
        body.email.as_deref(),
        body.department.as_deref(),
    )
    .await?;
    let updated = chatportal_db::admins::update_admin_access(
        &state.db,
        admin_id,
        body.role.map(Role::as_str),
        body.is_active,
    )
    .await?;

    let view = admin_json(&updated);
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_ADMIN_UPDATE, "admin", meta)
            .entity(admin_id)
            .changes(Some(admin_json(&before)), Some(view.clone())),
    );
    Ok(Json(view))
}

pub async fn delete_admin(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(admin_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let removed = chatportal_core::admin::delete_admin(&state.db, &actor, admin_id).await?;
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_ADMIN_DELETE, "admin", meta)
            .entity(admin_id)
            .changes(Some(admin_json(&removed)), None),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(admin_id): Path<i64>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    chatportal_core::admin::reset_password(&state.db, admin_id, &body.new_password).await?;
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_PASSWORD_RESET, "admin", meta)
            .entity(admin_id),
    );
    Ok(Json(json!({ "success": true })))
}

pub async fn unlock_admin(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(admin_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    chatportal_core::admin::unlock(&state.db, admin_id).await?;
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_ADMIN_UNLOCK, "admin", meta)
            .entity(admin_id),
    );
    Ok(Json(json!({ "success": true })))
}
