//! Thin forwarding client for the external chat service behind each app.

use crate::access::AppAccess;
use crate::error::CoreError;
use reqwest::{Method, Url};
use serde_json::{json, Value};

/// How an endpoint reacts when the upstream call fails.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPolicy {
    /// Surface the failure as an upstream error.
    Strict,
    /// Answer with this payload instead.
    Lenient(Value),
}

#[derive(Clone)]
pub struct ChatGateway {
    http: reqwest::Client,
}

impl ChatGateway {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn send_message(&self, access: &AppAccess, body: Value) -> Result<Value, CoreError> {
        let url = upstream_url(&access.app.api_url, &["chat-messages"])?;
        let mut body = with_user(body, access);
        if body.get("response_mode").is_none() {
            body["response_mode"] = json!("blocking");
        }
        self.call(Method::POST, url, &access.app.api_key, Some(body), UpstreamPolicy::Strict)
            .await
    }

    pub async fn send_feedback(
        &self,
        access: &AppAccess,
        message_id: &str,
        body: Value,
    ) -> Result<Value, CoreError> {
        let url = upstream_url(&access.app.api_url, &["messages", message_id, "feedbacks"])?;
        let body = with_user(body, access);
        self.call(Method::POST, url, &access.app.api_key, Some(body), UpstreamPolicy::Strict)
            .await
    }

    pub async fn parameters(&self, access: &AppAccess) -> Result<Value, CoreError> {
        let mut url = upstream_url(&access.app.api_url, &["parameters"])?;
        url.query_pairs_mut().append_pair("user", &access.chat_user_id());
        self.call(
            Method::GET,
            url,
            &access.app.api_key,
            None,
            UpstreamPolicy::Lenient(json!({})),
        )
        .await
    }

    pub async fn rename_conversation(
        &self,
        access: &AppAccess,
        conversation_id: &str,
        body: Value,
    ) -> Result<Value, CoreError> {
        let url = upstream_url(&access.app.api_url, &["conversations", conversation_id, "name"])?;
        let body = with_user(body, access);
        self.call(
            Method::POST,
            url,
            &access.app.api_key,
            Some(body),
            UpstreamPolicy::Lenient(json!({ "success": true })),
        )
        .await
    }

    async fn call(
        &self,
        method: Method,
        url: Url,
        api_key: &str,
        body: Option<Value>,
        policy: UpstreamPolicy,
    ) -> Result<Value, CoreError> {
        match self.try_call(method, url.clone(), api_key, body).await {
            Ok(value) => Ok(value),
            Err(reason) => match policy {
                UpstreamPolicy::Strict => {
                    tracing::error!(%url, "upstream chat call failed: {reason}");
                    Err(CoreError::Upstream)
                }
                UpstreamPolicy::Lenient(fallback) => {
                    tracing::warn!(%url, "upstream chat call failed, using fallback: {reason}");
                    Ok(fallback)
                }
            },
        }
    }

    async fn try_call(
        &self,
        method: Method,
        url: Url,
        api_key: &str,
        body: Option<Value>,
    ) -> Result<Value, String> {
        let mut request = self.http.request(method, url).bearer_auth(api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("status {status}: {text}"));
        }
        response.json::<Value>().await.map_err(|e| e.to_string())
    }
}

/// Stamp the synthesized chat user onto a request body, replacing any
/// caller-supplied value.
fn with_user(body: Value, access: &AppAccess) -> Value {
    let mut body = match body {
        Value::Object(map) => Value::Object(map),
        _ => json!({}),
    };
    body["user"] = json!(access.chat_user_id());
    body
}

fn upstream_url(base: &str, segments: &[&str]) -> Result<Url, CoreError> {
    let mut url = Url::parse(base)
        .map_err(|e| CoreError::Internal(format!("invalid app api_url '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| CoreError::Internal(format!("app api_url '{base}' cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
