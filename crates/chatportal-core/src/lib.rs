pub mod access;
pub mod admin;
pub mod audit;
pub mod auth;
pub mod authz;
pub mod chat;
pub mod embed;
pub mod error;
pub mod jwt;
pub mod legacy;
pub mod session;
pub mod usage;

use audit::AuditLogger;
use chat::ChatGateway;
use chatportal_db::DbPool;
use embed::EmbedSigner;
use jwt::TokenService;
use legacy::LegacyAuthClient;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifetime of the end-user `auth_token` cookie.
pub const USER_SESSION_SECONDS: u64 = 3600;

/// Settings that can be changed at runtime via the admin console.
#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub portal_name: String,
    /// Applied to new apps that do not state their own limit.
    pub default_max_anonymous_msgs: i64,
    pub maintenance_notice: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            portal_name: "Chat Portal".to_string(),
            default_max_anonymous_msgs: 10,
            maintenance_notice: String::new(),
        }
    }
}

impl RuntimeSettings {
    pub const KEYS: [&'static str; 3] = [
        "portal_name",
        "default_max_anonymous_msgs",
        "maintenance_notice",
    ];

    /// Overlay stored key/value pairs. Unknown keys and unparsable numbers
    /// are ignored.
    pub fn apply(&mut self, values: &[(String, String)]) {
        for (key, value) in values {
            match key.as_str() {
                "portal_name" => self.portal_name = value.clone(),
                "default_max_anonymous_msgs" => {
                    if let Ok(n) = value.trim().parse::<i64>() {
                        if n >= 0 {
                            self.default_max_anonymous_msgs = n;
                        }
                    }
                }
                "maintenance_notice" => self.maintenance_notice = value.clone(),
                _ => {}
            }
        }
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("portal_name".into(), self.portal_name.clone()),
            (
                "default_max_anonymous_msgs".into(),
                self.default_max_anonymous_msgs.to_string(),
            ),
            ("maintenance_notice".into(), self.maintenance_notice.clone()),
        ]
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Path segment of the admin API, e.g. `admin` for `/api/admin/...`.
    pub admin_base_path: String,
    pub secure_cookies: bool,
    /// Honour `x-user-*` identity headers. Only safe behind a proxy that
    /// overwrites them on every request.
    pub trust_identity_headers: bool,
    pub max_login_attempts: i64,
    pub lock_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_base_path: "admin".to_string(),
            secure_cookies: false,
            trust_identity_headers: false,
            max_login_attempts: 5,
            lock_minutes: 30,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub runtime: Arc<RwLock<RuntimeSettings>>,
    pub tokens: Arc<TokenService>,
    pub embed: Arc<EmbedSigner>,
    pub legacy_auth: Arc<LegacyAuthClient>,
    pub chat: ChatGateway,
    pub audit: AuditLogger,
}
