use axum::{extract::State, Json};
use chatportal_core::audit::AuditEntry;
use chatportal_core::AppState;
use chatportal_models::audit_log::{ActorType, ACTION_SETTINGS_UPDATE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ClientMeta, SuperAdmin};

fn settings_json(settings: &chatportal_core::RuntimeSettings) -> Value {
    json!({
        "portal_name": settings.portal_name,
        "default_max_anonymous_msgs": settings.default_max_anonymous_msgs,
        "maintenance_notice": settings.maintenance_notice,
    })
}

/// Branding and notices shown to end users, no auth needed.
pub async fn public_settings(State(state): State<AppState>) -> Json<Value> {
    let runtime = state.runtime.read().await;
    Json(json!({
        "portal_name": runtime.portal_name,
        "maintenance_notice": runtime.maintenance_notice,
    }))
}

pub async fn get_settings(
    State(state): State<AppState>,
    _admin: SuperAdmin,
) -> Result<Json<Value>, ApiError> {
    let runtime = state.runtime.read().await;
    Ok(Json(settings_json(&runtime)))
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub portal_name: Option<String>,
    pub default_max_anonymous_msgs: Option<i64>,
    pub maintenance_notice: Option<String>,
}

pub async fn update_settings(
    State(state): State<AppState>,
    SuperAdmin(actor): SuperAdmin,
    ClientMeta(meta): ClientMeta,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut updates: Vec<(String, String)> = Vec::new();
    if let Some(name) = body.portal_name {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(ApiError::BadRequest(
                "portal_name must be 1-100 characters".into(),
            ));
        }
        updates.push(("portal_name".into(), name.to_string()));
    }
    if let Some(limit) = body.default_max_anonymous_msgs {
        if limit < 0 {
            return Err(ApiError::BadRequest(
                "default_max_anonymous_msgs cannot be negative".into(),
            ));
        }
        updates.push(("default_max_anonymous_msgs".into(), limit.to_string()));
    }
    if let Some(notice) = body.maintenance_notice {
        updates.push(("maintenance_notice".into(), notice));
    }
    if updates.is_empty() {
        return Err(ApiError::BadRequest("No settings to update".into()));
    }

    chatportal_db::server_settings::set_settings(&state.db, &updates).await?;

    let (before, after) = {
        let mut runtime = state.runtime.write().await;
        let before = settings_json(&runtime);
        runtime.apply(&updates);
        (before, settings_json(&runtime))
    };

    state.audit.log(
        AuditEntry::new(actor.login_id, ActorType::Admin, ACTION_SETTINGS_UPDATE, "settings", meta)
            .changes(Some(before), Some(after.clone())),
    );
    Ok(Json(after))
}
