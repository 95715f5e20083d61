use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;

fn harden_secret_file_permissions(path: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub embed: EmbedConfig,
    #[serde(default)]
    pub legacy_auth: LegacyAuthConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Path segment of the admin API: `/api/{admin_base_path}/...`.
    #[serde(default = "default_admin_base_path")]
    pub admin_base_path: String,
    /// Mark session cookies `Secure`. Enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    /// Accept `x-user-*` identity headers from a fronting proxy.
    #[serde(default)]
    pub trust_identity_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            admin_base_path: default_admin_base_path(),
            secure_cookies: false,
            trust_identity_headers: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// RS256 key material. Inline PEM wins over the `*_path` variant.
#[derive(Debug, Deserialize, Serialize)]
pub struct JwtConfig {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
    #[serde(default = "default_jwt_issuer")]
    pub issuer: String,
    #[serde(default = "default_jwt_audience")]
    pub audience: String,
    #[serde(default = "default_jwt_expiry_hours")]
    pub expiry_hours: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            public_key: None,
            private_key_path: Some(default_private_key_path()),
            public_key_path: Some(default_public_key_path()),
            issuer: default_jwt_issuer(),
            audience: default_jwt_audience(),
            expiry_hours: default_jwt_expiry_hours(),
        }
    }
}

impl JwtConfig {
    pub fn private_key_pem(&self) -> Result<String> {
        read_pem(&self.private_key, &self.private_key_path, "private")
    }

    pub fn public_key_pem(&self) -> Result<String> {
        read_pem(&self.public_key, &self.public_key_path, "public")
    }
}

fn read_pem(inline: &Option<String>, path: &Option<String>, which: &str) -> Result<String> {
    if let Some(pem) = inline.as_deref().filter(|p| !p.trim().is_empty()) {
        // Env values often carry escaped newlines.
        return Ok(pem.replace("\\n", "\n"));
    }
    let path = path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .with_context(|| format!("no JWT {which} key configured"))?;
    fs::read_to_string(path).with_context(|| format!("reading JWT {which} key from '{path}'"))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmbedConfig {
    pub hmac_secret: String,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            hmac_secret: generate_random_hex(64),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthModeConfig {
    #[default]
    Mock,
    Live,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LegacyAuthConfig {
    #[serde(default)]
    pub mode: AuthModeConfig,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: i64,
    #[serde(default = "default_lock_minutes")]
    pub lock_minutes: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: default_max_login_attempts(),
            lock_minutes: default_lock_minutes(),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Generate a cryptographically random hex string of the given length.
fn generate_random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..16u8);
            char::from(if idx < 10 {
                b'0' + idx
            } else {
                b'a' + idx - 10
            })
        })
        .collect()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".into()
}
fn default_admin_base_path() -> String {
    "admin".into()
}
fn default_database_url() -> String {
    "sqlite://./data/chatportal.db?mode=rwc".into()
}
fn default_max_connections() -> u32 {
    10
}
fn default_private_key_path() -> String {
    "config/jwt_private.pem".into()
}
fn default_public_key_path() -> String {
    "config/jwt_public.pem".into()
}
fn default_jwt_issuer() -> String {
    "chatportal".into()
}
fn default_jwt_audience() -> String {
    "chatportal".into()
}
/// One year.
const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 366;

fn default_jwt_expiry_hours() -> u64 {
    chatportal_core::jwt::DEFAULT_EXPIRY_HOURS
}
fn default_max_login_attempts() -> i64 {
    5
}
fn default_lock_minutes() -> i64 {
    30
}

fn looks_like_placeholder_secret(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return true;
    }
    normalized.contains("change_me")
        || normalized.contains("changeme")
        || normalized.contains("replace_me")
        || normalized.contains("replace_with")
        || normalized.contains("your-secret")
        || normalized.starts_with("example")
        || normalized == "secret"
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn validate(config: &Config) -> Result<()> {
    let secret = config.embed.hmac_secret.trim();
    if secret.len() < 32 || looks_like_placeholder_secret(secret) {
        anyhow::bail!(
            "Invalid embed.hmac_secret: use a strong random secret (at least 32 characters) and never leave placeholder values"
        );
    }

    if config.legacy_auth.mode == AuthModeConfig::Live
        && config
            .legacy_auth
            .api_url
            .as_deref()
            .is_none_or(|url| url.trim().is_empty())
    {
        anyhow::bail!("legacy_auth.api_url (LEGACY_AUTH_API_URL) is required in live mode");
    }

    let jwt = &config.jwt;
    let has = |inline: &Option<String>, path: &Option<String>| {
        inline.as_deref().is_some_and(|v| !v.trim().is_empty())
            || path.as_deref().is_some_and(|v| !v.trim().is_empty())
    };
    if !has(&jwt.private_key, &jwt.private_key_path) || !has(&jwt.public_key, &jwt.public_key_path)
    {
        anyhow::bail!("both JWT private and public keys must be configured");
    }
    if jwt.expiry_hours == 0 || jwt.expiry_hours > MAX_JWT_EXPIRY_HOURS {
        anyhow::bail!("jwt.expiry_hours must be between 1 and {MAX_JWT_EXPIRY_HOURS}");
    }

    let base = config.server.admin_base_path.trim_matches('/');
    if base.is_empty() || base == "v1" || base.contains('/') {
        anyhow::bail!("admin base path must be a single path segment other than 'v1'");
    }
    if config.admin.max_login_attempts < 1 || config.admin.lock_minutes < 1 {
        anyhow::bail!("admin.max_login_attempts and admin.lock_minutes must be positive");
    }
    Ok(())
}

/// Generate a commented config file template with the given values filled in.
fn generate_config_template(config: &Config) -> String {
    format!(
        r#"# Chat Portal Server Configuration
# Generated automatically on first run. Edit as needed.

[server]
bind_address = "{bind_address}"
# Admin API lives under /api/<admin_base_path>/
admin_base_path = "{admin_base_path}"
# Set to true when served over HTTPS.
secure_cookies = {secure_cookies}
# Only enable behind a proxy that overwrites x-user-id, x-user-login-id
# and x-user-name on every request.
trust_identity_headers = {trust_identity_headers}

[database]
url = "{db_url}"
max_connections = {max_connections}

[jwt]
# RS256 key pair, PEM files. Inline `private_key`/`public_key` also work.
private_key_path = "{private_key_path}"
public_key_path = "{public_key_path}"
issuer = "{issuer}"
audience = "{audience}"
expiry_hours = {expiry_hours}

[embed]
hmac_secret = "{hmac_secret}"

[legacy_auth]
# "mock" uses built-in test accounts; "live" calls api_url.
mode = "mock"
# api_url = "https://legacy.example.com/api/auth/login"

[admin]
max_login_attempts = {max_login_attempts}
lock_minutes = {lock_minutes}
"#,
        bind_address = config.server.bind_address,
        admin_base_path = config.server.admin_base_path,
        secure_cookies = config.server.secure_cookies,
        trust_identity_headers = config.server.trust_identity_headers,
        db_url = config.database.url,
        max_connections = config.database.max_connections,
        private_key_path = default_private_key_path(),
        public_key_path = default_public_key_path(),
        issuer = config.jwt.issuer,
        audience = config.jwt.audience,
        expiry_hours = config.jwt.expiry_hours,
        hmac_secret = config.embed.hmac_secret,
        max_login_attempts = config.admin.max_login_attempts,
        lock_minutes = config.admin.lock_minutes,
    )
}

// ── Config Loading ───────────────────────────────────────────────────────────

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load from `path` with overrides looked up through `env`.
    pub fn load_with(path: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!(
                "Config file not found at '{}', generating defaults...",
                path
            );
            let config = Config::default();

            if let Some(parent) = std::path::Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }

            let template = generate_config_template(&config);
            fs::write(path, &template)?;
            if let Err(e) = harden_secret_file_permissions(path) {
                tracing::warn!("Could not restrict permissions on '{}': {}", path, e);
            }
            tracing::info!("Generated default config at '{}'", path);
            config
        };

        config.apply_env_overrides(env);
        validate(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(value) = env("JWT_PRIVATE_KEY") {
            self.jwt.private_key = Some(value);
        }
        if let Some(value) = env("JWT_PUBLIC_KEY") {
            self.jwt.public_key = Some(value);
        }
        if let Some(value) = env("JWT_PRIVATE_KEY_PATH") {
            self.jwt.private_key_path = Some(value);
        }
        if let Some(value) = env("JWT_PUBLIC_KEY_PATH") {
            self.jwt.public_key_path = Some(value);
        }
        if let Some(value) = env("JWT_ISSUER") {
            self.jwt.issuer = value;
        }
        if let Some(value) = env("JWT_AUDIENCE") {
            self.jwt.audience = value;
        }
        if let Some(value) = env("JWT_EXPIRY_HOURS") {
            match value.trim().parse::<u64>() {
                Ok(hours) => self.jwt.expiry_hours = hours,
                Err(_) => tracing::warn!("Ignoring invalid JWT_EXPIRY_HOURS value '{}'", value),
            }
        }
        if let Some(value) = env("EMBED_HMAC_SECRET") {
            self.embed.hmac_secret = value;
        }
        if let Some(value) = env("AUTH_MODE") {
            match value.trim().to_ascii_lowercase().as_str() {
                "mock" => self.legacy_auth.mode = AuthModeConfig::Mock,
                "live" => self.legacy_auth.mode = AuthModeConfig::Live,
                _ => tracing::warn!(
                    "Ignoring invalid AUTH_MODE value '{}'; expected mock or live",
                    value
                ),
            }
        }
        if let Some(value) = env("LEGACY_AUTH_API_URL") {
            self.legacy_auth.api_url = Some(value);
        }
        if let Some(value) = env("NEXT_PUBLIC_ADMIN_BASE_PATH") {
            self.server.admin_base_path = value.trim().trim_matches('/').to_string();
        }
        if let Some(value) = env("CHATPORTAL_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = env("CHATPORTAL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = env("CHATPORTAL_COOKIE_SECURE") {
            if let Some(parsed) = parse_bool(&value) {
                self.server.secure_cookies = parsed;
            }
        }
        if let Some(value) = env("CHATPORTAL_TRUST_IDENTITY_HEADERS") {
            if let Some(parsed) = parse_bool(&value) {
                self.server.trust_identity_headers = parsed;
            }
        }
    }
}
