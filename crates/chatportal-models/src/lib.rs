pub mod audit_log;
pub mod identity;
pub mod role;
