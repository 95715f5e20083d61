use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Admin,
    User,
    System,
}

impl ActorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::System => "system",
        }
    }
}

pub const ACTION_ADMIN_LOGIN: &str = "admin.login";
pub const ACTION_ADMIN_CREATE: &str = "admin.create";
pub const ACTION_ADMIN_UPDATE: &str = "admin.update";
pub const ACTION_ADMIN_DELETE: &str = "admin.delete";
pub const ACTION_PASSWORD_CHANGE: &str = "admin.password_change";
pub const ACTION_PASSWORD_RESET: &str = "admin.password_reset";
pub const ACTION_ADMIN_UNLOCK: &str = "admin.unlock";
pub const ACTION_GROUP_CREATE: &str = "group.create";
pub const ACTION_GROUP_UPDATE: &str = "group.update";
pub const ACTION_GROUP_DELETE: &str = "group.delete";
pub const ACTION_GROUP_MEMBER_ADD: &str = "group.member_add";
pub const ACTION_GROUP_MEMBER_REMOVE: &str = "group.member_remove";
pub const ACTION_GROUP_APPS_SET: &str = "group.apps_set";
pub const ACTION_APP_CREATE: &str = "app.create";
pub const ACTION_APP_UPDATE: &str = "app.update";
pub const ACTION_APP_DELETE: &str = "app.delete";
pub const ACTION_SETTINGS_UPDATE: &str = "settings.update";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_id: String,
    pub actor_type: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub changes: Option<serde_json::Value>,
    pub success: bool,
    pub ip_address: String,
    pub user_agent: String,
    pub request_path: String,
    pub created_at: DateTime<Utc>,
}
