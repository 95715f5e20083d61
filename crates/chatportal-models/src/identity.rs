use crate::role::Role;
use serde::{Deserialize, Serialize};

/// The principal a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login_id: String,
    pub employee_number: String,
    pub display_name: String,
    pub role: Role,
}

impl Identity {
    /// Identifier handed to the upstream chat service for a signed-in user.
    pub fn chat_user_id(&self, app_id: i64) -> String {
        format!("user_{}:{}", app_id, self.employee_number)
    }
}

/// Identifier handed to the upstream chat service for an anonymous session.
pub fn anonymous_chat_user_id(app_id: i64, session_id: &str) -> String {
    format!("anon_{}:{}", app_id, session_id)
}
