use axum::{
    extract::{Query, State},
    Json,
};
use chatportal_core::AppState;
use chatportal_util::pagination::PaginationParams;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::SuperAdmin;

#[derive(Deserialize)]
pub struct AuditLogFilter {
    pub actor_id: Option<String>,
    pub action: Option<String>,
}

pub async fn get_audit_logs(
    State(state): State<AppState>,
    _admin: SuperAdmin,
    Query(params): Query<AuditLogFilter>,
    Query(page): Query<PaginationParams>,
) -> Result<Json<Value>, ApiError> {
    let entries = chatportal_db::audit_log::list_entries(
        &state.db,
        params.actor_id.as_deref().filter(|v| !v.is_empty()),
        params.action.as_deref().filter(|v| !v.is_empty()),
        page.before,
        page.limit(),
    )
    .await?;

    let audit_log_entries: Vec<Value> = entries
        .iter()
        .map(|e| {
            json!({
                "id": e.id.to_string(),
                "actor_id": e.actor_id,
                "actor_type": e.actor_type,
                "action": e.action,
                "entity_type": e.entity_type,
                "entity_id": e.entity_id,
                "changes": e.changes,
                "success": e.success,
                "ip_address": e.ip_address,
                "user_agent": e.user_agent,
                "request_path": e.request_path,
                "created_at": e.created_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(json!({
        "audit_log_entries": audit_log_entries,
    })))
}
