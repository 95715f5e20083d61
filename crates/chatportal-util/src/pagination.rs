use serde::Deserialize;

/// Keyset pagination over snowflake ids, newest first.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            before: None,
            limit: Some(50),
        }
    }
}
