use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("upstream service error")]
    Upstream,
    #[error("database error: {0}")]
    Database(#[from] chatportal_db::DbError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn password_policy(errors: Vec<String>) -> Self {
        CoreError::Validation {
            message: "Password does not meet the password policy".into(),
            details: errors,
        }
    }
}
