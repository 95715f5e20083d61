//! HMAC-SHA256 signed launch parameters for embedding the portal in a host
//! page that already knows who the user is.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between signer and verifier, in seconds.
pub const EMBED_TOLERANCE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedIdentity {
    pub login_id: String,
    pub emp_no: String,
    pub name: String,
}

/// Raw parameters as received from a query string or JSON body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedParams {
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub emp_no: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub ts: Option<String>,
    #[serde(default)]
    pub sig: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignedEmbed {
    pub sig: String,
    pub ts: i64,
    pub canonical: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedError {
    #[error("Missing required parameters")]
    MissingParameters,
    #[error("Invalid timestamp")]
    InvalidTimestamp,
    #[error("Timestamp expired")]
    TimestampExpired,
    #[error("Invalid signature")]
    InvalidSignature,
}

pub struct EmbedSigner {
    secret: Vec<u8>,
}

impl EmbedSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn sign(&self, identity: &EmbedIdentity) -> SignedEmbed {
        self.sign_at(identity, chrono::Utc::now().timestamp())
    }

    pub fn sign_at(&self, identity: &EmbedIdentity, ts: i64) -> SignedEmbed {
        let canonical = canonical_string(
            &identity.login_id,
            &identity.emp_no,
            &identity.name,
            &ts.to_string(),
        );
        SignedEmbed {
            sig: hex::encode(self.mac(&canonical)),
            ts,
            canonical,
        }
    }

    pub fn verify(&self, params: &EmbedParams) -> Result<EmbedIdentity, EmbedError> {
        self.verify_at(params, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, params: &EmbedParams, now: i64) -> Result<EmbedIdentity, EmbedError> {
        let (Some(login_id), Some(emp_no), Some(name), Some(ts), Some(sig)) = (
            non_empty(&params.login_id),
            non_empty(&params.emp_no),
            non_empty(&params.name),
            non_empty(&params.ts),
            non_empty(&params.sig),
        ) else {
            return Err(EmbedError::MissingParameters);
        };

        let issued: i64 = ts
            .trim()
            .parse()
            .map_err(|_| EmbedError::InvalidTimestamp)?;
        if now.abs_diff(issued) > EMBED_TOLERANCE_SECS {
            return Err(EmbedError::TimestampExpired);
        }

        let expected = self.mac(&canonical_string(login_id, emp_no, name, ts));
        let provided = hex::decode(sig).map_err(|_| EmbedError::InvalidSignature)?;
        if provided.len() != expected.len() || !bool::from(provided.ct_eq(&expected)) {
            return Err(EmbedError::InvalidSignature);
        }

        Ok(EmbedIdentity {
            login_id: login_id.to_string(),
            emp_no: emp_no.to_string(),
            name: name.to_string(),
        })
    }

    fn mac(&self, canonical: &str) -> Vec<u8> {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(canonical.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

pub fn canonical_string(login_id: &str, emp_no: &str, name: &str, ts: &str) -> String {
    format!("loginId={login_id}&empNo={emp_no}&name={name}&ts={ts}")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    }))
}
