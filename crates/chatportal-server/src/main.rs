use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatportal_core::audit::AuditLogger;
use chatportal_core::chat::ChatGateway;
use chatportal_core::embed::EmbedSigner;
use chatportal_core::jwt::{JwtSettings, TokenService};
use chatportal_core::legacy::{AuthMode, LegacyAuthClient};
use chatportal_core::{AppConfig, AppState, RuntimeSettings};
use clap::Parser;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatportal=info,tower_http=debug")),
        )
        .init();

    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;

    ensure_database_dir(&config.database.url);
    let db = chatportal_db::create_pool(&config.database.url, config.database.max_connections)
        .await?;
    chatportal_db::run_migrations(&db).await?;

    if let Some(login_id) = args.bootstrap_super_admin.as_deref() {
        let password = std::env::var("CHATPORTAL_BOOTSTRAP_PASSWORD")
            .context("CHATPORTAL_BOOTSTRAP_PASSWORD must be set to bootstrap a super admin")?;
        let created =
            chatportal_core::admin::bootstrap_super_admin(&db, login_id.trim(), &password).await?;
        if !created {
            tracing::info!("Admins already exist, skipping bootstrap of '{}'", login_id);
        }
    }

    let tokens = TokenService::new(JwtSettings {
        private_key_pem: config.jwt.private_key_pem()?,
        public_key_pem: config.jwt.public_key_pem()?,
        issuer: config.jwt.issuer.clone(),
        audience: config.jwt.audience.clone(),
        expiry_hours: config.jwt.expiry_hours,
    })?;

    let http = reqwest::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()?;
    let auth_mode = match config.legacy_auth.mode {
        config::AuthModeConfig::Mock => {
            tracing::warn!("Legacy auth is in mock mode; do not use in production");
            AuthMode::Mock
        }
        config::AuthModeConfig::Live => AuthMode::Live {
            url: config.legacy_auth.api_url.clone().unwrap_or_default(),
        },
    };

    let admin_base_path = config.server.admin_base_path.trim_matches('/').to_string();
    let state = AppState {
        db: db.clone(),
        config: AppConfig {
            admin_base_path: admin_base_path.clone(),
            secure_cookies: config.server.secure_cookies,
            trust_identity_headers: config.server.trust_identity_headers,
            max_login_attempts: config.admin.max_login_attempts,
            lock_minutes: config.admin.lock_minutes,
        },
        runtime: Arc::new(RwLock::new(load_runtime_settings(&db).await)),
        tokens: Arc::new(tokens),
        embed: Arc::new(EmbedSigner::new(&config.embed.hmac_secret)),
        legacy_auth: Arc::new(LegacyAuthClient::new(auth_mode, http.clone())),
        chat: ChatGateway::new(http),
        audit: AuditLogger::new(db),
    };

    let app = chatportal_api::build_router(&admin_base_path).with_state(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        "Chat portal listening on {} (admin API at /api/{}/)",
        config.server.bind_address,
        admin_base_path
    );

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down (ctrl-c)...");
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

/// Ensure the SQLite file's parent directory exists before connecting.
fn ensure_database_dir(url: &str) {
    if let Some(db_path) = url.strip_prefix("sqlite://").and_then(|s| s.split('?').next()) {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!("Could not create directory '{}': {}", parent.display(), e);
                }
            }
        }
    }
}

async fn load_runtime_settings(db: &chatportal_db::DbPool) -> RuntimeSettings {
    let mut settings = RuntimeSettings::default();
    match chatportal_db::server_settings::get_all_settings(db).await {
        Ok(stored) => settings.apply(&stored),
        Err(e) => tracing::warn!("Could not load stored settings, using defaults: {}", e),
    }
    settings
}
