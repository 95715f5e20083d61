use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chatportal_core::audit::AuditEntry;
use chatportal_core::AppState;
use chatportal_db::groups::{GroupMemberRow, GroupRow};
use chatportal_models::audit_log::{
    ActorType, ACTION_GROUP_APPS_SET, ACTION_GROUP_CREATE, ACTION_GROUP_DELETE,
    ACTION_GROUP_MEMBER_ADD, ACTION_GROUP_MEMBER_REMOVE, ACTION_GROUP_UPDATE,
};
use chatportal_models::role::GroupRole;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ClientMeta, SuperAdmin};
use crate::routes::{de_id, de_ids};

fn group_json(g: &GroupRow) -> Value {
    json!({
        "id": g.id.to_string(),
        "name": g.name,
        "description": g.description,
        "is_active": g.is_active,
        "member_count": g.member_count,
        "created_at": g.created_at.to_rfc3339(),
    })
}

fn member_json(m: &GroupMemberRow) -> Value {
    json!({
        "admin_id": m.admin_id.to_string(),
        "login_id": m.login_id,
        "name": m.name,
        "group_role": m.group_role,
    })
}

fn ids_json(ids: &[i64]) -> Value {
    json!(ids.iter().map(i64::to_string).collect::<Vec<_>>())
}

fn validate_group_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ApiError::BadRequest(
            "Group name must be 1-100 characters".into(),
        ));
    }
    Ok(name)
}

async fn name_taken(state: &AppState, name: &str, except: Option<i64>) -> Result<bool, ApiError> {
    let groups = chatportal_db::groups::list_groups(&state.db).await?;
    Ok(groups
        .iter()
        .any(|g| g.name.eq_ignore_ascii_case(name) && Some(g.id) != except))
}

pub async fn list_groups(
    State(state): State<AppState>,
    SuperAdmin(_admin): SuperAdmin,
) -> Result<Json<Value>, ApiError> {
    let groups = chatportal_db::groups::list_groups(&state.db).await?;
    Ok(Json(json!({
        "groups": groups.iter().map(group_json).collect::<Vec<_>>(),
    })))
}

pub async fn get_group(
    State(state): State<AppState>,
    SuperAdmin(_admin): SuperAdmin,
    Path(group_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let group = chatportal_db::groups::get_group(&state.db, group_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let members = chatportal_db::groups::list_members(&state.db, group_id).await?;
    let app_ids = chatportal_db::groups::list_group_app_ids(&state.db, group_id).await?;

    let mut body = group_json(&group);
    body["members"] = json!(members.iter().map(member_json).collect::<Vec<_>>());
    body["app_ids"] = ids_json(&app_ids);
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
}

pub async fn create_group(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = validate_group_name(&body.name)?;
    if name_taken(&state, name, None).await? {
        return Err(ApiError::Conflict("Group name is already in use".into()));
    }
    let group = chatportal_db::groups::create_group(
        &state.db,
        chatportal_util::snowflake::generate(1),
        name,
        body.description.as_deref(),
    )
    .await?;

    let view = group_json(&group);
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_GROUP_CREATE, "group", meta)
            .entity(group.id)
            .changes(None, Some(view.clone())),
    );
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn update_group(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(group_id): Path<i64>,
    Json(body): Json<UpdateGroupRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = body.name.as_deref().map(validate_group_name).transpose()?;
    if let Some(name) = name {
        if name_taken(&state, name, Some(group_id)).await? {
            return Err(ApiError::Conflict("Group name is already in use".into()));
        }
    }
    let before = chatportal_db::groups::get_group(&state.db, group_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let updated = chatportal_db::groups::update_group(
        &state.db,
        group_id,
        name,
        body.description.as_deref(),
        body.is_active,
    )
    .await?;

    let view = group_json(&updated);
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_GROUP_UPDATE, "group", meta)
            .entity(group_id)
            .changes(Some(group_json(&before)), Some(view.clone())),
    );
    Ok(Json(view))
}

pub async fn delete_group(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(group_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let before = chatportal_db::groups::get_group(&state.db, group_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    chatportal_db::groups::delete_group(&state.db, group_id).await?;
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_GROUP_DELETE, "group", meta)
            .entity(group_id)
            .changes(Some(group_json(&before)), None),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    #[serde(alias = "adminId", deserialize_with = "de_id")]
    pub admin_id: i64,
    #[serde(default, alias = "groupRole")]
    pub group_role: GroupRole,
}

pub async fn add_member(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(group_id): Path<i64>,
    Json(body): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    chatportal_core::authz::add_group_member(&state.db, group_id, body.admin_id, body.group_role)
        .await?;
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_GROUP_MEMBER_ADD, "group", meta)
            .entity(group_id)
            .changes(
                None,
                Some(json!({
                    "admin_id": body.admin_id.to_string(),
                    "group_role": body.group_role,
                })),
            ),
    );
    let members = chatportal_db::groups::list_members(&state.db, group_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "members": members.iter().map(member_json).collect::<Vec<_>>() })),
    ))
}

pub async fn remove_member(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path((group_id, admin_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    chatportal_core::authz::remove_group_member(&state.db, group_id, admin_id).await?;
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_GROUP_MEMBER_REMOVE, "group", meta)
            .entity(group_id)
            .changes(Some(json!({ "admin_id": admin_id.to_string() })), None),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct SetAppsRequest {
    #[serde(alias = "appIds", deserialize_with = "de_ids")]
    pub app_ids: Vec<i64>,
}

pub async fn set_apps(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(group_id): Path<i64>,
    Json(body): Json<SetAppsRequest>,
) -> Result<Json<Value>, ApiError> {
    chatportal_db::groups::get_group(&state.db, group_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut requested = body.app_ids;
    requested.sort_unstable();
    requested.dedup();
    let existing = chatportal_db::apps::existing_app_ids(&state.db, &requested).await?;
    if existing.len() != requested.len() {
        let unknown: Vec<String> = requested
            .iter()
            .filter(|id| !existing.contains(*id))
            .map(i64::to_string)
            .collect();
        return Err(ApiError::BadRequest(format!(
            "Unknown app ids: {}",
            unknown.join(", ")
        )));
    }

    let before = chatportal_db::groups::list_group_app_ids(&state.db, group_id).await?;
    chatportal_db::groups::set_group_apps(&state.db, group_id, &requested).await?;
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_GROUP_APPS_SET, "group", meta)
            .entity(group_id)
            .changes(Some(ids_json(&before)), Some(ids_json(&requested))),
    );
    Ok(Json(json!({ "app_ids": ids_json(&requested) })))
}
