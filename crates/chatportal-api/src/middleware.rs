use crate::error::ApiError;
use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{header, request::Parts, HeaderMap},
};
use chatportal_core::audit::RequestMeta;
use chatportal_core::authz::{self, AdminPrincipal};
use chatportal_core::jwt::TokenVerifier;
use chatportal_core::session::{self, RequestEvidence};
use chatportal_core::AppState;
use chatportal_models::identity::Identity;
use std::convert::Infallible;

pub const AUTH_COOKIE_NAME: &str = "auth_token";
pub const EMBED_COOKIE_NAME: &str = "embed_auth_token";
pub const ADMIN_COOKIE_NAME: &str = "admin_token";
pub const SESSION_ID_HEADER: &str = "x-session-id";

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn get_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in raw.split(';') {
        let trimmed = part.trim();
        let Some((name, value)) = trimmed.split_once('=') else {
            continue;
        };
        if name == cookie_name && !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::AUTHORIZATION.as_str())?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Address used for app IP allow-lists.
pub fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .or_else(|| header_str(headers, "cf-connecting-ip"))
        .unwrap_or("unknown")
        .to_string()
}

/// Identity headers are read only when `trust_identity_headers` is set;
/// otherwise a client could claim any employee number.
pub fn request_evidence(headers: &HeaderMap, trust_identity_headers: bool) -> RequestEvidence {
    let injected = |name: &str| {
        header_str(headers, name)
            .filter(|_| trust_identity_headers)
            .map(str::to_string)
    };
    RequestEvidence {
        injected_employee_number: injected("x-user-id"),
        injected_login_id: injected("x-user-login-id"),
        injected_name_b64: injected("x-user-name"),
        bearer_token: bearer_token(headers),
        auth_cookie: get_cookie_value(headers, AUTH_COOKIE_NAME),
        embed_cookie: get_cookie_value(headers, EMBED_COOKIE_NAME),
    }
}

pub fn session_id(headers: &HeaderMap) -> Option<String> {
    header_str(headers, SESSION_ID_HEADER).map(str::to_string)
}

/// Resolved end user, or `None` for anonymous callers.
pub struct MaybeUser(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let evidence = request_evidence(&parts.headers, state.config.trust_identity_headers);
        Ok(MaybeUser(session::resolve_identity(
            &evidence,
            state.tokens.as_ref(),
        )))
    }
}

/// Extractor that requires a resolved end user.
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(identity) = match MaybeUser::from_request_parts(parts, state).await {
            Ok(user) => user,
            Err(never) => match never {},
        };
        identity.map(AuthUser).ok_or_else(ApiError::unauthorized)
    }
}

/// Extractor for the admin console: an admin token whose account still
/// exists, is active and holds an admin role.
pub struct AdminUser(pub AdminPrincipal);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = [
            bearer_token(&parts.headers),
            get_cookie_value(&parts.headers, ADMIN_COOKIE_NAME),
        ]
        .into_iter()
        .flatten()
        .find_map(|token| state.tokens.verify(&token))
        .ok_or_else(ApiError::unauthorized)?;

        let admin = authz::authorize_admin(&state.db, &claims).await?;
        Ok(AdminUser(admin))
    }
}

/// Like [`AdminUser`] but only for super admins.
pub struct SuperAdmin(pub AdminPrincipal);

impl FromRequestParts<AppState> for SuperAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AdminUser(admin) = AdminUser::from_request_parts(parts, state).await?;
        authz::require_super_admin(&admin)
            .map_err(|_| ApiError::Forbidden("Super admin access required".into()))?;
        Ok(SuperAdmin(admin))
    }
}

/// Request origin details for the audit trail.
pub struct ClientMeta(pub RequestMeta);

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Nested routers see a stripped URI; audit the one the client sent.
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let headers = &parts.headers;
        Ok(ClientMeta(RequestMeta::from_headers(
            |name| headers.get(name).and_then(|v| v.to_str().ok()),
            &path,
        )))
    }
}
