pub mod ip_allowlist;
pub mod pagination;
pub mod snowflake;
pub mod validation;
