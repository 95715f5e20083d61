use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chatportal_core::audit::AuditEntry;
use chatportal_core::authz;
use chatportal_core::AppState;
use chatportal_db::apps::{AppUpdate, NewApp};
use chatportal_models::audit_log::{ActorType, ACTION_APP_CREATE, ACTION_APP_DELETE, ACTION_APP_UPDATE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{AdminUser, ClientMeta, SuperAdmin};
use crate::routes::app_json;

fn check_allowed_ips(rules: &str) -> Result<(), ApiError> {
    let invalid = chatportal_util::ip_allowlist::invalid_rules(rules);
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation {
            message: "Invalid IP allow-list entries".into(),
            details: invalid,
        })
    }
}

fn check_api_url(url: &str) -> Result<(), ApiError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ApiError::BadRequest("api_url must be an http(s) URL".into()))
    }
}

pub async fn list_apps(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Value>, ApiError> {
    let visible = authz::visible_app_ids(&state.db, &admin).await?;
    let apps = chatportal_db::apps::list_apps(&state.db, visible.as_deref()).await?;
    Ok(Json(json!({
        "apps": apps.iter().map(app_json).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
pub struct CreateAppRequest {
    pub name: String,
    pub description: Option<String>,
    pub api_url: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub allow_anonymous: bool,
    pub max_anonymous_msgs: Option<i64>,
    #[serde(default)]
    pub allowed_ips: String,
}

fn default_true() -> bool {
    true
}

pub async fn create_app(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Json(body): Json<CreateAppRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    if body.api_key.trim().is_empty() {
        return Err(ApiError::BadRequest("api_key is required".into()));
    }
    check_api_url(&body.api_url)?;
    check_allowed_ips(&body.allowed_ips)?;
    let max_anonymous_msgs = match body.max_anonymous_msgs {
        Some(n) if n < 0 => {
            return Err(ApiError::BadRequest(
                "max_anonymous_msgs cannot be negative".into(),
            ))
        }
        Some(n) => n,
        None => state.runtime.read().await.default_max_anonymous_msgs,
    };

    let app = chatportal_db::apps::create_app(
        &state.db,
        &NewApp {
            id: chatportal_util::snowflake::generate(1),
            name,
            description: body.description.as_deref(),
            api_url: body.api_url.trim(),
            api_key: body.api_key.trim(),
            is_public: body.is_public,
            allow_anonymous: body.allow_anonymous,
            max_anonymous_msgs,
            allowed_ips: body.allowed_ips.trim(),
        },
    )
    .await?;

    let view = app_json(&app);
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_APP_CREATE, "app", meta)
            .entity(app.id)
            .changes(None, Some(view.clone())),
    );
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Deserialize)]
pub struct UpdateAppRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
    pub allow_anonymous: Option<bool>,
    pub max_anonymous_msgs: Option<i64>,
    pub allowed_ips: Option<String>,
}

pub async fn update_app(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientMeta(meta): ClientMeta,
    Path(app_id): Path<i64>,
    Json(body): Json<UpdateAppRequest>,
) -> Result<Json<Value>, ApiError> {
    let visible = authz::visible_app_ids(&state.db, &admin).await?;
    if !authz::can_see_app(visible.as_deref(), app_id) {
        return Err(ApiError::NotFound);
    }
    if let Some(url) = body.api_url.as_deref() {
        check_api_url(url)?;
    }
    if let Some(rules) = body.allowed_ips.as_deref() {
        check_allowed_ips(rules)?;
    }
    if body.max_anonymous_msgs.is_some_and(|n| n < 0) {
        return Err(ApiError::BadRequest(
            "max_anonymous_msgs cannot be negative".into(),
        ));
    }
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("name cannot be empty".into()));
    }

    let before = chatportal_db::apps::get_app(&state.db, app_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let updated = chatportal_db::apps::update_app(
        &state.db,
        app_id,
        &AppUpdate {
            name: body.name.as_deref().map(str::trim),
            description: body.description.as_deref(),
            api_url: body.api_url.as_deref().map(str::trim),
            api_key: body.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()),
            is_active: body.is_active,
            is_public: body.is_public,
            allow_anonymous: body.allow_anonymous,
            max_anonymous_msgs: body.max_anonymous_msgs,
            allowed_ips: body.allowed_ips.as_deref().map(str::trim),
        },
    )
    .await?;

    let view = app_json(&updated);
    let mut after = view.clone();
    if body.api_key.is_some() {
        after["api_key_changed"] = json!(true);
    }
    state.audit.log(
        AuditEntry::new(admin.login_id, ActorType::Admin, ACTION_APP_UPDATE, "app", meta)
            .entity(app_id)
            .changes(Some(app_json(&before)), Some(after)),
    );
    Ok(Json(view))
}

pub async fn delete_app(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Path(app_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let before = chatportal_db::apps::get_app(&state.db, app_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    chatportal_db::apps::delete_app(&state.db, app_id).await?;
    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_APP_DELETE, "app", meta)
            .entity(app_id)
            .changes(Some(app_json(&before)), None),
    );
    Ok(StatusCode::NO_CONTENT)
}
