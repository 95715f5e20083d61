//! Works out who is behind a user-side request.
//!
//! Priority: identity headers injected by a trusted fronting proxy, then
//! the first verifiable token among bearer header, `auth_token` cookie and
//! `embed_auth_token` cookie. Nothing usable means anonymous.

use crate::jwt::TokenVerifier;
use base64::{engine::general_purpose::STANDARD, Engine};
use chatportal_models::identity::Identity;
use chatportal_models::role::Role;

/// Everything identity-bearing pulled off a request.
#[derive(Debug, Clone, Default)]
pub struct RequestEvidence {
    /// `x-user-id`: employee number.
    pub injected_employee_number: Option<String>,
    /// `x-user-login-id`.
    pub injected_login_id: Option<String>,
    /// `x-user-name`, base64 of the UTF-8 display name.
    pub injected_name_b64: Option<String>,
    pub bearer_token: Option<String>,
    pub auth_cookie: Option<String>,
    pub embed_cookie: Option<String>,
}

pub fn identity_from_injected_headers(evidence: &RequestEvidence) -> Option<Identity> {
    let employee_number = present(&evidence.injected_employee_number)?;
    let login_id = present(&evidence.injected_login_id)?;
    let encoded_name = present(&evidence.injected_name_b64)?;

    let decoded = match STANDARD.decode(encoded_name) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!("ignoring x-user-name that is not base64: {err}");
            return None;
        }
    };
    let display_name = String::from_utf8(decoded).ok()?;

    Some(Identity {
        login_id: login_id.to_string(),
        employee_number: employee_number.to_string(),
        display_name,
        role: Role::User,
    })
}

pub fn resolve_identity<V: TokenVerifier + ?Sized>(
    evidence: &RequestEvidence,
    verifier: &V,
) -> Option<Identity> {
    if let Some(identity) = identity_from_injected_headers(evidence) {
        return Some(identity);
    }

    [
        &evidence.bearer_token,
        &evidence.auth_cookie,
        &evidence.embed_cookie,
    ]
    .into_iter()
    .filter_map(present)
    .find_map(|token| verifier.verify(token))
    .map(|claims| claims.identity())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
