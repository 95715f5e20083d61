//! Bridge to the legacy employee directory used for end-user sign-in.

use chatportal_models::role::Role;
use serde::Serialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

const INVALID_CREDENTIALS: &str = "Invalid login ID or password";
const SERVICE_UNAVAILABLE: &str = "Authentication service unavailable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    Mock,
    Live { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyUser {
    pub employee_number: String,
    pub login_id: String,
    pub name: String,
    pub department: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAuthResult {
    pub success: bool,
    pub data: Option<LegacyUser>,
    pub error: Option<String>,
}

impl LegacyAuthResult {
    fn ok(user: LegacyUser) -> Self {
        Self {
            success: true,
            data: Some(user),
            error: None,
        }
    }

    fn fail(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

struct MockAccount {
    login_id: &'static str,
    password: &'static str,
    employee_number: &'static str,
    name: &'static str,
    department: &'static str,
    role: Role,
}

const MOCK_ACCOUNTS: [MockAccount; 2] = [
    MockAccount {
        login_id: "testuser",
        password: "Test1234!@",
        employee_number: "E10001",
        name: "Test User",
        department: "Engineering",
        role: Role::User,
    },
    MockAccount {
        login_id: "testadmin",
        password: "Admin1234!@",
        employee_number: "E10002",
        name: "Test Admin",
        department: "IT",
        role: Role::Admin,
    },
];

pub struct LegacyAuthClient {
    mode: AuthMode,
    http: reqwest::Client,
}

impl LegacyAuthClient {
    pub fn new(mode: AuthMode, http: reqwest::Client) -> Self {
        Self { mode, http }
    }

    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    pub async fn authenticate(&self, login_id: &str, password: &str) -> LegacyAuthResult {
        match &self.mode {
            AuthMode::Mock => authenticate_mock(login_id, password),
            AuthMode::Live { url } => self.authenticate_live(url, login_id, password).await,
        }
    }

    async fn authenticate_live(&self, url: &str, login_id: &str, password: &str) -> LegacyAuthResult {
        let response = match self
            .http
            .post(url)
            .json(&json!({ "loginId": login_id, "password": password }))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                tracing::warn!("legacy auth request failed: {err}");
                return LegacyAuthResult::fail(SERVICE_UNAVAILABLE);
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("legacy auth rejected login for {login_id}: status {status}");
            return LegacyAuthResult::fail(INVALID_CREDENTIALS);
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!("legacy auth returned unreadable body: {err}");
                return LegacyAuthResult::fail(SERVICE_UNAVAILABLE);
            }
        };

        match normalize_response(&body) {
            Some(user) => LegacyAuthResult::ok(user),
            None => LegacyAuthResult::fail(INVALID_CREDENTIALS),
        }
    }
}

fn authenticate_mock(login_id: &str, password: &str) -> LegacyAuthResult {
    let account = MOCK_ACCOUNTS.iter().find(|a| a.login_id == login_id);
    match account {
        Some(account)
            if account.password.len() == password.len()
                && bool::from(account.password.as_bytes().ct_eq(password.as_bytes())) =>
        {
            LegacyAuthResult::ok(LegacyUser {
                employee_number: account.employee_number.to_string(),
                login_id: account.login_id.to_string(),
                name: account.name.to_string(),
                department: Some(account.department.to_string()),
                role: account.role,
            })
        }
        _ => LegacyAuthResult::fail(INVALID_CREDENTIALS),
    }
}

/// Map whatever shape the directory returns onto a [`LegacyUser`].
///
/// Fields are looked up under `data` first, then at the root. Employee
/// number and login id are required; everything else has a fallback.
pub fn normalize_response(body: &Value) -> Option<LegacyUser> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let record = match body.get("data") {
        Some(data) if data.is_object() => data,
        _ => body,
    };

    let employee_number = first_string(record, &["employeeNumber", "empNo", "emp_no"])?;
    let login_id = first_string(record, &["loginId", "login_id", "userId"])?;
    let name = first_string(record, &["name", "displayName", "userName"])
        .unwrap_or_else(|| login_id.clone());
    let department = first_string(record, &["department", "dept", "deptName"]);
    let role = first_string(record, &["role"])
        .and_then(|r| Role::parse(&r))
        .unwrap_or(Role::User);

    Some(LegacyUser {
        employee_number,
        login_id,
        name,
        department,
        role,
    })
}

fn first_string(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
