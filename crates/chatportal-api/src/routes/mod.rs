pub mod admin_apps;
pub mod admin_auth;
pub mod admins;
pub mod apps;
pub mod audit_logs;
pub mod auth;
pub mod chat;
pub mod groups;
pub mod settings;
pub mod statistics;

use crate::error::ApiError;
use axum::http::HeaderValue;
use chatportal_db::admins::AdminRow;
use chatportal_db::apps::AppRow;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

pub(crate) fn build_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure_attr = if secure { "; Secure" } else { "" };
    format!("{name}={value}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}{secure_attr}")
}

pub(crate) fn clear_cookie(name: &str, secure: bool) -> String {
    let secure_attr = if secure { "; Secure" } else { "" };
    format!("{name}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0{secure_attr}")
}

pub(crate) fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("invalid header value: {}", e)))
}

/// Ids travel as strings in JSON. Plain numbers are accepted on input.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn parse<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            RawId::Number(n) => Ok(n),
            RawId::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid id '{s}'"))),
        }
    }
}

pub(crate) fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    RawId::deserialize(deserializer)?.parse()
}

pub(crate) fn de_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
    Vec::<RawId>::deserialize(deserializer)?
        .into_iter()
        .map(RawId::parse)
        .collect()
}

pub(crate) fn admin_json(a: &AdminRow) -> Value {
    json!({
        "id": a.id.to_string(),
        "login_id": a.login_id,
        "name": a.name,
        "email": a.email,
        "department": a.department,
        "role": a.role,
        "is_active": a.is_active,
        "login_attempts": a.login_attempts,
        "locked_until": a.locked_until.map(|t| t.to_rfc3339()),
        "group_id": a.group_id.map(|id| id.to_string()),
        "group_role": a.group_role,
        "created_at": a.created_at.to_rfc3339(),
        "updated_at": a.updated_at.to_rfc3339(),
    })
}

/// Admin-console view of an app. The upstream key never leaves the server.
pub(crate) fn app_json(a: &AppRow) -> Value {
    json!({
        "id": a.id.to_string(),
        "name": a.name,
        "description": a.description,
        "api_url": a.api_url,
        "is_active": a.is_active,
        "is_public": a.is_public,
        "allow_anonymous": a.allow_anonymous,
        "max_anonymous_msgs": a.max_anonymous_msgs,
        "allowed_ips": a.allowed_ips,
        "created_at": a.created_at.to_rfc3339(),
        "updated_at": a.updated_at.to_rfc3339(),
    })
}

/// End-user view of an app.
pub(crate) fn public_app_json(a: &AppRow) -> Value {
    json!({
        "id": a.id.to_string(),
        "name": a.name,
        "description": a.description,
        "is_public": a.is_public,
        "allow_anonymous": a.allow_anonymous,
        "max_anonymous_msgs": a.max_anonymous_msgs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        #[serde(deserialize_with = "de_id")]
        id: i64,
        #[serde(deserialize_with = "de_ids")]
        ids: Vec<i64>,
    }

    #[test]
    fn ids_accept_strings_and_numbers() {
        let body: Body =
            serde_json::from_value(json!({ "id": "42", "ids": [1, "2"] })).expect("body");
        assert_eq!(body.id, 42);
        assert_eq!(body.ids, vec![1, 2]);
        assert!(serde_json::from_value::<Body>(json!({ "id": "x", "ids": [] })).is_err());
    }

    #[test]
    fn cookies_carry_flags() {
        assert_eq!(
            build_cookie("auth_token", "t", 3600, true),
            "auth_token=t; HttpOnly; Path=/; SameSite=Lax; Max-Age=3600; Secure"
        );
        assert_eq!(
            clear_cookie("auth_token", false),
            "auth_token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"
        );
    }
}
