#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use chatportal_core::admin::admin_identity;
use chatportal_core::audit::AuditLogger;
use chatportal_core::authz::AdminPrincipal;
use chatportal_core::chat::ChatGateway;
use chatportal_core::embed::EmbedSigner;
use chatportal_core::jwt::{JwtSettings, TokenService};
use chatportal_core::legacy::{AuthMode, LegacyAuthClient};
use chatportal_core::{AppConfig, AppState, RuntimeSettings};
use chatportal_db::admins::{create_admin, NewAdmin};
use chatportal_db::apps::{create_app, NewApp};
use chatportal_models::identity::Identity;
use chatportal_models::role::Role;
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceExt;

pub const EMBED_SECRET: &str = "integration-embed-secret-0123456789abcdef";

/// Nothing listens on the discard port, so upstream calls fail fast.
pub const DEAD_UPSTREAM: &str = "http://127.0.0.1:9/v1";

pub struct TestContext {
    pub app: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn cookies(&self) -> Vec<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_admin_base("admin").await
    }

    pub async fn with_admin_base(admin_base_path: &str) -> anyhow::Result<Self> {
        Self::with_config(AppConfig {
            admin_base_path: admin_base_path.to_string(),
            ..AppConfig::default()
        })
        .await
    }

    /// Behaves as if a fronting proxy sets the `x-user-*` headers.
    pub async fn trusting_identity_headers() -> anyhow::Result<Self> {
        Self::with_config(AppConfig {
            trust_identity_headers: true,
            ..AppConfig::default()
        })
        .await
    }

    pub async fn with_config(config: AppConfig) -> anyhow::Result<Self> {
        let db = chatportal_db::create_pool("sqlite::memory:", 1).await?;
        chatportal_db::run_migrations(&db).await?;

        let tokens = TokenService::new(JwtSettings {
            private_key_pem: include_str!("../fixtures/jwt_private.pem").to_string(),
            public_key_pem: include_str!("../fixtures/jwt_public.pem").to_string(),
            issuer: "chatportal-test".to_string(),
            audience: "chatportal".to_string(),
            expiry_hours: 8,
        })?;
        let http = reqwest::Client::new();

        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            runtime: Arc::new(RwLock::new(RuntimeSettings::default())),
            tokens: Arc::new(tokens),
            embed: Arc::new(EmbedSigner::new(EMBED_SECRET)),
            legacy_auth: Arc::new(LegacyAuthClient::new(AuthMode::Mock, http.clone())),
            chat: ChatGateway::new(http),
            audit: AuditLogger::new(db),
        };

        let app = chatportal_api::build_router(&config.admin_base_path).with_state(state.clone());
        Ok(Self { app, state })
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> anyhow::Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    pub fn user_token(&self, login_id: &str, employee_number: &str) -> anyhow::Result<String> {
        Ok(self.state.tokens.sign(&Identity {
            login_id: login_id.to_string(),
            employee_number: employee_number.to_string(),
            display_name: format!("{login_id} name"),
            role: Role::User,
        })?)
    }

    /// Insert an admin row and return a valid console token for it.
    pub async fn seed_admin(&self, id: i64, login_id: &str, role: Role) -> anyhow::Result<String> {
        self.seed_admin_with_hash(id, login_id, role, "unused").await
    }

    pub async fn seed_admin_with_hash(
        &self,
        id: i64,
        login_id: &str,
        role: Role,
        password_hash: &str,
    ) -> anyhow::Result<String> {
        let row = create_admin(
            &self.state.db,
            &NewAdmin {
                id,
                login_id,
                password_hash,
                name: login_id,
                email: None,
                department: None,
                role: role.as_str(),
            },
        )
        .await?;
        let principal = AdminPrincipal::from_row(&row)?;
        Ok(self.state.tokens.sign(&admin_identity(&principal))?)
    }

    pub async fn seed_app(
        &self,
        id: i64,
        name: &str,
        allow_anonymous: bool,
        allowed_ips: &str,
    ) -> anyhow::Result<()> {
        create_app(
            &self.state.db,
            &NewApp {
                id,
                name,
                description: None,
                api_url: DEAD_UPSTREAM,
                api_key: "app-key",
                is_public: true,
                allow_anonymous,
                max_anonymous_msgs: 2,
                allowed_ips,
            },
        )
        .await?;
        Ok(())
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
