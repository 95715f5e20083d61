use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatportal_core::auth::AuthError;
use chatportal_core::error::CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("Upstream service error")]
    Upstream,
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".into())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("Forbidden".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = match &self {
            ApiError::Validation { message, details } => {
                json!({ "error": message, "details": details })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound => ApiError::NotFound,
            CoreError::Unauthorized => ApiError::unauthorized(),
            CoreError::Forbidden => ApiError::forbidden(),
            CoreError::BadRequest(msg) => ApiError::BadRequest(msg),
            CoreError::Validation { message, details } => ApiError::Validation { message, details },
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            CoreError::RateLimited(msg) => ApiError::RateLimited(msg),
            CoreError::Upstream => ApiError::Upstream,
            CoreError::Database(err) => ApiError::Internal(anyhow::anyhow!(err)),
            CoreError::Internal(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials
            | AuthError::AccountLocked
            | AuthError::AccountDisabled => ApiError::Unauthorized(e.to_string()),
            AuthError::KeyConfig(msg) | AuthError::Internal(msg) => {
                ApiError::Internal(anyhow::anyhow!(msg))
            }
        }
    }
}

impl From<chatportal_db::DbError> for ApiError {
    fn from(e: chatportal_db::DbError) -> Self {
        match e {
            chatportal_db::DbError::NotFound => ApiError::NotFound,
            chatportal_db::DbError::Sqlx(err) => ApiError::Internal(anyhow::anyhow!(err)),
        }
    }
}
